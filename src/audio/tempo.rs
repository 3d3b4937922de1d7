use crate::foundation::error::{ReelError, ReelResult};

/// Smallest factor one tempo stage accepts.
pub const MIN_STAGE: f64 = 0.5;
/// Exclusive upper bound of one tempo stage. Matches the speed ceiling of the retiming plan.
pub const MAX_STAGE: f64 = 2.0;

/// Tempo stages whose product is `speed`. Empty when no adjustment is needed.
///
/// Each stage lies in `[MIN_STAGE, MAX_STAGE)`; larger factors are split into `MAX_STAGE` stages
/// followed by the remainder, so `2.0` becomes `[2.0, 1.0]`.
pub fn tempo_chain(speed: f64) -> ReelResult<Vec<f64>> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ReelError::validation(format!(
            "tempo factor must be finite and positive, got {speed}"
        )));
    }
    if (speed - 1.0).abs() <= f64::EPSILON {
        return Ok(Vec::new());
    }
    let mut rest = speed;
    let mut chain = Vec::new();
    while rest >= MAX_STAGE {
        chain.push(MAX_STAGE);
        rest /= MAX_STAGE;
    }
    while rest < MIN_STAGE {
        chain.push(MIN_STAGE);
        rest /= MIN_STAGE;
    }
    chain.push(rest);
    Ok(chain)
}

/// `atempo` filter chain for `stages`, or `None` for an empty chain.
pub fn atempo_filter(stages: &[f64]) -> Option<String> {
    if stages.is_empty() {
        return None;
    }
    Some(
        stages
            .iter()
            .map(|f| format!("atempo={f:.6}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/audio/tempo.rs"]
mod tests;
