//! `vidrelay cookies` – check the cookies file used for age-restricted videos.

use anyhow::Result;
use std::time::SystemTime;
use vidrelay_core::config::RelayConfig;
use vidrelay_core::cookies::inspect_cookies;

pub fn run_cookies(cfg: &RelayConfig) -> Result<()> {
    let Some(path) = cfg.fetcher.cookies_file.as_deref() else {
        println!("No cookies file configured (fetcher.cookies_file).");
        return Ok(());
    };
    let report = inspect_cookies(path, SystemTime::now())?;
    if !report.present {
        println!("Cookies file {} does not exist.", path.display());
        return Ok(());
    }
    println!("{}: {} cookie(s)", path.display(), report.entries);
    match report.soonest_important {
        None => println!("No auth cookies found; age-restricted videos will fail."),
        Some(c) => match c.remaining {
            None => println!("{} has expired; export fresh cookies.", c.name),
            Some(left) => {
                let days = left.as_secs() / 86_400;
                let hours = (left.as_secs() % 86_400) / 3_600;
                println!("{} expires first, in {}d {}h.", c.name, days, hours);
            }
        },
    }
    Ok(())
}
