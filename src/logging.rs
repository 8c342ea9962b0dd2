//! Log output with the bot token masked
//!
//! Every formatted line passes through [`redact`] before reaching stderr, so
//! request URLs logged by teloxide or reqwest never leak the credential.

use lazy_regex::{lazy_regex, Lazy, Regex};
use std::io::{self, Write};
use tracing_subscriber::{prelude::*, EnvFilter};

const MASK: &str = "[TELEGRAM_TOKEN]";

/// `https://api.telegram.org/bot<token>/method`
static API_URL_TOKEN: Lazy<Regex> =
    lazy_regex!(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)");
/// Bare `<id>:<secret>` pair
static BARE_TOKEN: Lazy<Regex> = lazy_regex!(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}");
/// `bot<id>:<secret>` outside a URL
static PREFIXED_TOKEN: Lazy<Regex> = lazy_regex!(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+");

/// Replace anything shaped like a bot token with a placeholder
#[must_use]
pub fn redact(input: &str) -> String {
    let output = API_URL_TOKEN.replace_all(input, format!("${{1}}{MASK}${{3}}"));
    let output = BARE_TOKEN.replace_all(&output, MASK);
    PREFIXED_TOKEN
        .replace_all(&output, format!("${{1}}{MASK}"))
        .into_owned()
}

struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // Callers track the unredacted length
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
        }
    }
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), stderr
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}
