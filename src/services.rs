use crate::model::TaskId;
use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use std::io::{self, BufRead, Write};

const ID_LEN: usize = 10;

pub trait IdGenerator {
    fn next_id(&mut self) -> TaskId;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    /// Local calendar date; its midnight is the start-of-today instant.
    fn today(&self) -> NaiveDate;
}

/// Yes/no gate in front of destructive operations.
pub trait ConfirmGate {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> TaskId {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes` declines.
#[derive(Debug, Clone, Copy)]
pub struct PromptGate {
    pub assume_yes: bool,
}

impl ConfirmGate for PromptGate {
    fn confirm(&mut self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let mut stderr = io::stderr();
        if write!(stderr, "{} [y/N] ", message)
            .and_then(|_| stderr.flush())
            .is_err()
        {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                tracing::warn!(%err, "could not read confirmation; treating as no");
                false
            }
        }
    }
}
