use std::{fmt, time::Duration};

/// An estimated time to completion, reported as an absolute duration rather
/// than a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eta {
    seconds: u64,
}

impl Eta {
    pub fn zero() -> Eta { Eta { seconds: 0 } }

    pub fn from_secs(seconds: u64) -> Eta { Eta { seconds } }

    /// Estimates the remaining time from the mean throughput so far.
    pub fn estimate(bytes_done: u64, bytes_total: u64, elapsed: Duration) -> Eta {
        let elapsed = elapsed.as_secs() as f64 + f64::from(elapsed.subsec_nanos()) / 1e9;
        if bytes_done == 0 || elapsed <= 0.0 {
            return Eta::zero();
        }

        let speed = bytes_done as f64 / elapsed;
        let remaining = (bytes_total - bytes_done) as f64;
        Eta { seconds: (remaining / speed) as u64 }
    }

    pub fn as_secs(&self) -> u64 { self.seconds }

    pub fn is_zero(&self) -> bool { self.seconds == 0 }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let days = self.seconds / (24 * 3600);
        let hours = (self.seconds % (24 * 3600)) / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;
        write!(f, "{}D, {}H, {}M, {}S", days, hours, minutes, seconds)
    }
}
