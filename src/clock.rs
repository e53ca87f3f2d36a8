use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveTime};

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Redraws the local time once a second. Runs forever when `ticks` is `None`.
pub fn run_clock(ticks: Option<u64>) -> io::Result<()> {
    let mut out = io::stdout();
    let mut drawn = 0u64;
    loop {
        write!(out, "\r🕒 {}", format_clock(Local::now().time()))?;
        out.flush()?;
        drawn += 1;
        if ticks.is_some_and(|limit| drawn >= limit) {
            break;
        }
        thread::sleep(Duration::from_secs(1));
    }
    writeln!(out)
}
