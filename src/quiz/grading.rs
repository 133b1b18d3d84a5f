use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grade {
    Unsatisfactory,
    Satisfactory,
    Good,
    Excellent,
}

impl Grade {
    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::Satisfactory => "satisfactory",
            Grade::Unsatisfactory => "unsatisfactory",
        }
    }

    /// Label printed on results and certificates.
    pub fn title(self) -> &'static str {
        match self {
            Grade::Excellent => "Отлично",
            Grade::Good => "Хорошо",
            Grade::Satisfactory => "Удовлетворительно",
            Grade::Unsatisfactory => "Неудовлетворительно",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Grade::Excellent => "🏆",
            Grade::Good => "👍",
            Grade::Satisfactory => "🙂",
            Grade::Unsatisfactory => "😔",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excellent" => Ok(Grade::Excellent),
            "good" => Ok(Grade::Good),
            "satisfactory" => Ok(Grade::Satisfactory),
            "unsatisfactory" => Ok(Grade::Unsatisfactory),
            other => Err(format!("unknown grade {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeBand {
    pub min_percentage: f64,
    pub grade: Grade,
}

/// Threshold table mapping a percentage to a grade. Bands are kept sorted
/// from the highest threshold down; anything below the last band is
/// unsatisfactory.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeScale {
    bands: Vec<GradeBand>,
}

pub const DEFAULT_THRESHOLDS: [f64; 3] = [90.0, 75.0, 60.0];

impl Default for GradeScale {
    fn default() -> Self {
        Self::from_thresholds(DEFAULT_THRESHOLDS).unwrap_or(Self { bands: Vec::new() })
    }
}

impl GradeScale {
    /// Builds the table from the excellent/good/satisfactory thresholds.
    /// Returns `None` unless they are strictly descending within 0..=100.
    pub fn from_thresholds(thresholds: [f64; 3]) -> Option<Self> {
        let in_range = thresholds.iter().all(|t| (0.0..=100.0).contains(t));
        let descending = thresholds.windows(2).all(|w| w[0] > w[1]);
        if !in_range || !descending {
            return None;
        }

        let grades = [Grade::Excellent, Grade::Good, Grade::Satisfactory];
        let bands = thresholds
            .into_iter()
            .zip(grades)
            .map(|(min_percentage, grade)| GradeBand {
                min_percentage,
                grade,
            })
            .collect();
        Some(Self { bands })
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }

    pub fn grade_for(&self, percentage: f64) -> Grade {
        self.bands
            .iter()
            .find(|band| percentage >= band.min_percentage)
            .map(|band| band.grade)
            .unwrap_or(Grade::Unsatisfactory)
    }

    pub fn grade(&self, correct: usize, total: usize) -> Score {
        let percentage = percentage(correct, total);
        Score {
            correct,
            total,
            percentage,
            grade: self.grade_for(percentage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub grade: Grade,
}

/// Share of correct answers in percent, rounded to one decimal.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = correct as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_scores() {
        let scale = GradeScale::default();

        let score = scale.grade(18, 20);
        assert_eq!(score.percentage, 90.0);
        assert_eq!(score.grade, Grade::Excellent);
        assert_eq!(score.grade.as_str(), "excellent");

        let score = scale.grade(15, 30);
        assert_eq!(score.percentage, 50.0);
        assert_eq!(score.grade.as_str(), "unsatisfactory");
    }

    #[test]
    fn band_edges() {
        let scale = GradeScale::default();
        assert_eq!(scale.grade_for(89.9), Grade::Good);
        assert_eq!(scale.grade_for(75.0), Grade::Good);
        assert_eq!(scale.grade_for(74.9), Grade::Satisfactory);
        assert_eq!(scale.grade_for(60.0), Grade::Satisfactory);
        assert_eq!(scale.grade_for(59.9), Grade::Unsatisfactory);
        assert_eq!(scale.grade_for(100.0), Grade::Excellent);
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(50, 50), 100.0);
    }

    #[test]
    fn grade_is_monotonic_in_correct_count() {
        let scale = GradeScale::default();
        for total in [1, 7, 20, 30, 40, 50] {
            let mut previous = scale.grade(0, total);
            for correct in 1..=total {
                let current = scale.grade(correct, total);
                assert!(current.percentage >= previous.percentage);
                assert!(current.grade >= previous.grade);
                previous = current;
            }
        }
    }

    #[test]
    fn custom_thresholds() {
        let scale = GradeScale::from_thresholds([80.0, 60.0, 40.0]).unwrap();
        assert_eq!(scale.grade(17, 20).grade, Grade::Excellent);
        assert_eq!(scale.grade(9, 20).grade, Grade::Satisfactory);
        assert_eq!(scale.bands().len(), 3);
    }

    #[test]
    fn rejects_unordered_thresholds() {
        assert!(GradeScale::from_thresholds([60.0, 75.0, 90.0]).is_none());
        assert!(GradeScale::from_thresholds([120.0, 75.0, 60.0]).is_none());
        assert!(GradeScale::from_thresholds([90.0, 90.0, 60.0]).is_none());
    }

    #[test]
    fn grade_names_parse_back() {
        for grade in [
            Grade::Excellent,
            Grade::Good,
            Grade::Satisfactory,
            Grade::Unsatisfactory,
        ] {
            assert_eq!(grade.as_str().parse::<Grade>(), Ok(grade));
        }
        assert!("perfect".parse::<Grade>().is_err());
    }
}
