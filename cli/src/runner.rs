//! Drivers feeding quote sources into the audit engine.
//!
//! Data flow per cycle:
//! QuoteSource → RawQuote → normalize → AuditEngine::update → Report (stdout)

use std::time::Duration;

use chrono::{Local, TimeZone};
use engine::risk_lock::LockTransition;
use engine::{AuditEngine, AuditResult, EngineConfig};
use market::RawQuote;
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{info, warn};

use crate::source::{QuoteSource, SourceError};

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// One printed line: the audit plus the capital it maps to.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    #[serde(flatten)]
    pub result: &'a AuditResult,
    pub allocation: f64,
    /// Local wall-clock time the risk lock ends at, `HH:MM:SS`.
    pub lock_until: Option<String>,
}

impl<'a> Report<'a> {
    pub fn new(result: &'a AuditResult, capital: f64) -> Self {
        Self {
            result,
            allocation: result.allocation(capital),
            lock_until: result.lock_until_ts_ms.and_then(format_local_time),
        }
    }
}

fn format_local_time(ts_ms: u64) -> Option<String> {
    let ts_ms = i64::try_from(ts_ms).ok()?;
    Local
        .timestamp_millis_opt(ts_ms)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
}

/// Monitoring session for one instrument.
pub struct Session {
    engine: AuditEngine,
    depth: usize,
    capital: f64,
    last_ts_ms: Option<u64>,
}

impl Session {
    pub fn new(instrument: &str, config: EngineConfig, capital: f64) -> Self {
        let depth = config.windows.book_depth;

        Self {
            engine: AuditEngine::new(instrument, config),
            depth,
            capital,
            last_ts_ms: None,
        }
    }

    pub fn engine(&self) -> &AuditEngine {
        &self.engine
    }

    /// Normalize and audit one quote. `fallback_ts_ms` stamps quotes that
    /// carry no timestamp of their own.
    pub fn process(&mut self, raw: &RawQuote, fallback_ts_ms: u64) -> AuditResult {
        let snapshot = raw.normalize(self.depth, fallback_ts_ms);
        self.last_ts_ms = Some(snapshot.ts_ms);

        let result = self.engine.update(&snapshot);

        if result.price_missing {
            warn!(instrument = %result.instrument_id, ts_ms = result.ts_ms, "quote carried no price; levels held");
        }

        if result.lock_transition == LockTransition::Engaged {
            info!(
                instrument = %result.instrument_id,
                remaining_secs = result.lock_seconds_remaining,
                "risk lock active; entries frozen"
            );
        }

        result
    }

    /// Print one JSON line for `result`.
    pub fn emit(&self, result: &AuditResult) -> anyhow::Result<()> {
        let line = serde_json::to_string(&Report::new(result, self.capital))?;
        println!("{line}");
        Ok(())
    }

    fn next_replay_ts(&self, step_ms: u64) -> u64 {
        self.last_ts_ms
            .map_or_else(now_ms, |last| last.saturating_add(step_ms))
    }
}

/// Audit every quote of `source` until it is exhausted.
///
/// Malformed quotes are skipped. Returns the number of audited quotes.
pub async fn replay<S: QuoteSource>(session: &mut Session, source: &mut S, step_ms: u64) -> anyhow::Result<u64> {
    let mut audited = 0u64;

    loop {
        match source.fetch().await {
            Ok(raw) => {
                let fallback = session.next_replay_ts(step_ms);
                let result = session.process(&raw, fallback);
                session.emit(&result)?;
                audited += 1;
            }
            Err(SourceError::Exhausted) => break,
            Err(SourceError::Decode(e)) => {
                warn!(error = %e, "malformed quote skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(audited, "replay finished");
    Ok(audited)
}

/// Poll `source` every `every` until `max_cycles` or Ctrl-C.
///
/// A fetch that fails or exceeds `fetch_timeout` skips the cycle; engine
/// state is left as it was. Returns the number of audited quotes.
pub async fn watch<S: QuoteSource>(
    session: &mut Session,
    source: &mut S,
    every: Duration,
    fetch_timeout: Duration,
    max_cycles: Option<u64>,
) -> anyhow::Result<u64> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        instrument = %session.engine().instrument_id(),
        every_ms = every.as_millis(),
        timeout_ms = fetch_timeout.as_millis(),
        "quote watcher started"
    );

    let mut cycles = 0u64;
    let mut audited = 0u64;

    loop {
        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping watcher");
                break;
            }
        }
        cycles += 1;

        let fetched = match timeout(fetch_timeout, source.fetch()).await {
            Ok(r) => r,
            Err(_) => Err(SourceError::Timeout(fetch_timeout)),
        };

        match fetched {
            Ok(raw) => {
                let _cycle = common::child_span("poll").entered();

                let result = session.process(&raw, now_ms());
                session.emit(&result)?;
                audited += 1;
            }
            Err(e) => {
                warn!(error = %e, cycle = cycles, "quote fetch failed; skipping cycle");
            }
        }
    }

    info!(cycles, audited, "quote watcher stopped");
    Ok(audited)
}
