//! Position sources.
//!
//! The pipeline takes any `Stream<Item = Position>`. A source that has no fix
//! or no permission simply yields nothing. `ReplaySource` turns newline
//! delimited text (a recorded walk, or stdin) into such a stream.

use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use photowalk_common::{PhotowalkError, Position};

/// Nominal cadence of a live location provider.
pub const LIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Replays positions from text, one per line, either as JSON
/// (`{"lat": 52.52, "lon": 13.405}`) or as `lat,lon`.
pub struct ReplaySource<R> {
    reader: R,
    interval: Duration,
}

impl<R> ReplaySource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            interval: Duration::ZERO,
        }
    }

    /// Wait `interval` between deliveries to mimic a live provider.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn into_stream(self) -> impl Stream<Item = Position> + Send + 'static {
        let state = ReplayState {
            lines: self.reader.lines(),
            interval: self.interval,
            line_no: 0,
            delivered: 0,
        };

        futures::stream::unfold(state, |mut state| async move {
            let position = state.next_position().await?;
            if state.delivered > 0 && !state.interval.is_zero() {
                tokio::time::sleep(state.interval).await;
            }
            state.delivered += 1;
            Some((position, state))
        })
    }
}

struct ReplayState<R> {
    lines: Lines<R>,
    interval: Duration,
    line_no: u64,
    delivered: u64,
}

impl<R: AsyncBufRead + Unpin> ReplayState<R> {
    /// Next readable position, skipping blank and unreadable lines. `None` at
    /// end of input or on a read error.
    async fn next_position(&mut self) -> Option<Position> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, line_no = self.line_no, "Position source read failed");
                    return None;
                }
            };
            self.line_no += 1;

            match parse_position_line(&line) {
                None => continue,
                Some(Ok(position)) => return Some(position),
                Some(Err(e)) => {
                    warn!(line_no = self.line_no, error = %e, "Skipping unusable position");
                }
            }
        }
    }
}

/// Parse one line of replay input. `None` for blank lines and `#` comments.
pub fn parse_position_line(line: &str) -> Option<Result<Position, PhotowalkError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let parsed = if line.starts_with('{') {
        serde_json::from_str::<Position>(line)
            .map_err(|e| PhotowalkError::MalformedPosition(format!("{line}: {e}")))
    } else {
        parse_pair(line)
    };

    Some(parsed.and_then(|p| Position::checked(p.lat, p.lon)))
}

fn parse_pair(line: &str) -> Result<Position, PhotowalkError> {
    let malformed = || PhotowalkError::MalformedPosition(line.to_string());
    let (lat, lon) = line.split_once(',').ok_or_else(malformed)?;
    let lat = lat.trim().parse().map_err(|_| malformed())?;
    let lon = lon.trim().parse().map_err(|_| malformed())?;
    Ok(Position::new(lat, lon))
}
