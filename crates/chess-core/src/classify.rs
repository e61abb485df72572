//! Move quality labels derived from successive evaluation scores.

use std::fmt;

use serde::Serialize;
use shakmaty::Color;

/// Band edges in pawn units.
const BRILLIANT_GAIN: f64 = 2.0;
const GREAT_GAIN: f64 = 1.0;
const EXCELLENT_GAIN: f64 = 0.5;
const BEST_BAND: f64 = 0.1;
const BLUNDER_LOSS: f64 = -2.0;
const MISTAKE_LOSS: f64 = -1.0;
const INACCURACY_LOSS: f64 = -0.5;

/// How fast the advantage bar moves for small scores.
const BAR_SCALE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveQuality {
    Brilliant,
    Great,
    Excellent,
    Best,
    Normal,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveQuality::Brilliant => "BRILLIANT",
            MoveQuality::Great => "GREAT",
            MoveQuality::Excellent => "EXCELLENT",
            MoveQuality::Best => "BEST",
            MoveQuality::Normal => "NORMAL",
            MoveQuality::Inaccuracy => "INACCURACY",
            MoveQuality::Mistake => "MISTAKE",
            MoveQuality::Blunder => "BLUNDER",
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label the move `side` just played, given the score before and after it.
///
/// Scores are pawn units from white's point of view. Bands are checked in a
/// fixed order and the first match wins, so the `BEST` band is tested before
/// the loss bands.
pub fn classify(previous: f64, current: f64, side: Color) -> MoveQuality {
    let delta = match side {
        Color::White => current - previous,
        Color::Black => previous - current,
    };

    if delta >= BRILLIANT_GAIN {
        MoveQuality::Brilliant
    } else if delta >= GREAT_GAIN {
        MoveQuality::Great
    } else if delta >= EXCELLENT_GAIN {
        MoveQuality::Excellent
    } else if (-BEST_BAND..=BEST_BAND).contains(&delta) {
        MoveQuality::Best
    } else if delta <= BLUNDER_LOSS {
        MoveQuality::Blunder
    } else if delta <= MISTAKE_LOSS {
        MoveQuality::Mistake
    } else if delta <= INACCURACY_LOSS {
        MoveQuality::Inaccuracy
    } else {
        MoveQuality::Normal
    }
}

/// Tally of labels for one side, for the end-of-game summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityCounts {
    pub brilliant: u32,
    pub great: u32,
    pub excellent: u32,
    pub best: u32,
    pub normal: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl QualityCounts {
    pub fn record(&mut self, quality: MoveQuality) {
        match quality {
            MoveQuality::Brilliant => self.brilliant += 1,
            MoveQuality::Great => self.great += 1,
            MoveQuality::Excellent => self.excellent += 1,
            MoveQuality::Best => self.best += 1,
            MoveQuality::Normal => self.normal += 1,
            MoveQuality::Inaccuracy => self.inaccuracy += 1,
            MoveQuality::Mistake => self.mistake += 1,
            MoveQuality::Blunder => self.blunder += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.brilliant
            + self.great
            + self.excellent
            + self.best
            + self.normal
            + self.inaccuracy
            + self.mistake
            + self.blunder
    }
}

impl FromIterator<MoveQuality> for QualityCounts {
    fn from_iter<I: IntoIterator<Item = MoveQuality>>(iter: I) -> Self {
        let mut counts = QualityCounts::default();
        for quality in iter {
            counts.record(quality);
        }
        counts
    }
}

/// White's share of the evaluation bar, 0 to 100. Soft-clamped with tanh so
/// that large advantages saturate instead of overflowing the bar.
pub fn advantage_percent(score: f64) -> f64 {
    if !score.is_finite() {
        return if score > 0.0 { 100.0 } else if score < 0.0 { 0.0 } else { 50.0 };
    }
    (50.0 + 50.0 * (score * BAR_SCALE).tanh()).clamp(0.0, 100.0)
}
