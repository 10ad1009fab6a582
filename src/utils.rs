use std::{cmp::Ordering, path::PathBuf};

use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// 获取当前时间
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// 初始化日志
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log) = log {
        // output to file，daily rotate, non-blocking
        if !log.is_dir() {
            anyhow::bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "englearn.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        // output to stdout
        tracing_appender::non_blocking(std::io::stdout())
    };
    tracing::subscriber::set_global_default(subscriber_builder.with_writer(non_blocking).finish())
        .map_err(|e| anyhow::anyhow!("init log failed: {e}"))?;
    Ok(guard)
}

/// Compare two identifiers treating runs of ASCII digits as numbers,
/// so `chapter2` sorts before `chapter10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_len = a.iter().take_while(|c| c.is_ascii_digit()).count();
                let b_len = b.iter().take_while(|c| c.is_ascii_digit()).count();
                let (a_num, a_rest) = a.split_at(a_len);
                let (b_num, b_rest) = b.split_at(b_len);
                let a_trim = trim_leading_zeros(a_num);
                let b_trim = trim_leading_zeros(b_num);
                let ord = a_trim
                    .len()
                    .cmp(&b_trim.len())
                    .then_with(|| a_trim.cmp(b_trim))
                    .then_with(|| a_len.cmp(&b_len));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = a_rest;
                b = b_rest;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn trim_leading_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|&&c| c == b'0').count();
    &digits[zeros..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_compares_numbers() {
        assert_eq!(natural_cmp("chapter2", "chapter10"), Ordering::Less);
        assert_eq!(natural_cmp("chapter10", "chapter9"), Ordering::Greater);
        assert_eq!(natural_cmp("a1b2", "a1b2"), Ordering::Equal);
        assert_eq!(natural_cmp("intro", "lesson1"), Ordering::Less);
        assert_eq!(natural_cmp("ch1", "ch1a"), Ordering::Less);
        assert_eq!(natural_cmp("ch01", "ch1"), Ordering::Greater);
    }

    #[test]
    fn natural_order_sorts_a_list() {
        let mut ids = vec!["ch10", "ch1", "ch2", "ch11", "ch3"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, ["ch1", "ch2", "ch3", "ch10", "ch11"]);
    }
}
