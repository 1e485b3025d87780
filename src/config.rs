//! Application-level configuration loaded from the environment.

use std::env;

use time::OffsetDateTime;
use tracing::warn;

/// Environment variable selecting the scoring rule (`flat:<points>` or
/// `time-decay`).
const SCORING_RULE_ENV: &str = "QUIZ_DUEL_SCORING";
/// Environment variable overriding the question-reveal duration.
const REVEAL_SECONDS_ENV: &str = "QUIZ_DUEL_REVEAL_SECONDS";
/// Environment variable overriding the scoring-lock lease.
const LOCK_LEASE_ENV: &str = "QUIZ_DUEL_LOCK_LEASE_SECONDS";

/// Seconds a question is shown before answering opens.
pub const DEFAULT_REVEAL_SECONDS: u64 = 5;
/// Answering-phase duration applied when the creator does not pick one.
pub const DEFAULT_TIMER_SECONDS: u32 = 30;
/// Shortest allowed answering-phase duration.
pub const MIN_TIMER_SECONDS: u32 = 5;
/// Longest allowed answering-phase duration.
pub const MAX_TIMER_SECONDS: u32 = 60;
/// Grace period after the answering deadline before a scoring lock left by a
/// crashed pass may be reclaimed.
pub const DEFAULT_LOCK_LEASE_SECONDS: u64 = 30;

/// How points are awarded for a correct answer. The rule is fixed per
/// deployment; one scoring pass never mixes formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringRule {
    /// A constant number of points for every correct answer.
    Flat(i64),
    /// `round(max(0, timer_seconds - elapsed))`: the faster the correct
    /// submission, the more points, clamped to the timer bounds.
    TimeDecay,
}

impl ScoringRule {
    /// Points awarded for a *correct* answer submitted at `submitted_at`
    /// during an answering phase that started at `phase_start`.
    pub fn points(
        &self,
        phase_start: OffsetDateTime,
        submitted_at: OffsetDateTime,
        timer_seconds: u32,
    ) -> i64 {
        match self {
            ScoringRule::Flat(points) => *points,
            ScoringRule::TimeDecay => {
                let elapsed = (submitted_at - phase_start).as_seconds_f64();
                let remaining = (f64::from(timer_seconds) - elapsed)
                    .clamp(0.0, f64::from(timer_seconds));
                remaining.round() as i64
            }
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the RPC surface listens on.
    pub port: u16,
    /// Scoring formula applied by every scoring pass.
    pub scoring: ScoringRule,
    /// Seconds a question is revealed before answering opens.
    pub reveal_seconds: u64,
    /// Answering duration used when match creation omits one.
    pub default_timer_seconds: u32,
    /// Grace period before a stale scoring lock may be reclaimed.
    pub lock_lease_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            scoring: ScoringRule::TimeDecay,
            reveal_seconds: DEFAULT_REVEAL_SECONDS,
            default_timer_seconds: DEFAULT_TIMER_SECONDS,
            lock_lease_seconds: DEFAULT_LOCK_LEASE_SECONDS,
        }
    }
}

impl AppConfig {
    /// Load the configuration from the environment, falling back to defaults
    /// on missing or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let scoring = match env::var(SCORING_RULE_ENV) {
            Ok(raw) => parse_scoring_rule(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "unrecognised scoring rule; using time-decay");
                defaults.scoring
            }),
            Err(_) => defaults.scoring,
        };

        let reveal_seconds = parse_env_u64(REVEAL_SECONDS_ENV, defaults.reveal_seconds);
        let lock_lease_seconds = parse_env_u64(LOCK_LEASE_ENV, defaults.lock_lease_seconds);

        Self {
            port,
            scoring,
            reveal_seconds,
            default_timer_seconds: defaults.default_timer_seconds,
            lock_lease_seconds,
        }
    }
}

fn parse_env_u64(name: &str, fallback: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "invalid integer; using default");
            fallback
        }),
        Err(_) => fallback,
    }
}

fn parse_scoring_rule(raw: &str) -> Option<ScoringRule> {
    if raw.eq_ignore_ascii_case("time-decay") {
        return Some(ScoringRule::TimeDecay);
    }
    raw.strip_prefix("flat:")
        .and_then(|points| points.parse::<i64>().ok())
        .map(ScoringRule::Flat)
}
