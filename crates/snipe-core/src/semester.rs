//! Semester identification and the registration system's addressing key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Academic season. The discriminants are the ordinals the registration
/// system uses to address each semester and must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Summer1 = 1,
    Summer2 = 2,
    Fall = 3,
    Spring = 4,
}

impl Season {
    /// Ordinal suffix used in the semester key.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Name as it appears in the site's `ViewSem` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summer1 => "Summer1",
            Self::Summer2 => "Summer2",
            Self::Fall => "Fall",
            Self::Spring => "Spring",
        }
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(' ', "").as_str() {
            "summer1" => Ok(Self::Summer1),
            "summer2" => Ok(Self::Summer2),
            "fall" => Ok(Self::Fall),
            "spring" => Ok(Self::Spring),
            other => Err(format!("'{other}' is not a valid season")),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One academic semester, e.g. `Fall 2025`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Semester {
    pub season: Season,
    pub year: u16,
}

impl Semester {
    pub fn new(season: Season, year: u16) -> Self {
        Self { season, year }
    }

    /// The key the registration system uses to address this semester's
    /// time-partitioned data (`KeySem`).
    ///
    /// The year component is the calendar year for Spring and the calendar
    /// year plus one for every other season, followed by the season ordinal.
    /// Spring 2025 -> `20254`, Fall 2025 -> `20263`. The asymmetry is imposed
    /// by the external system.
    pub fn semester_key(&self) -> String {
        let key_year = match self.season {
            Season::Spring => self.year,
            _ => self.year + 1,
        };
        format!("{key_year}{}", self.season.ordinal())
    }

    /// Numeric form of [`Self::semester_key`], used to order target sets
    /// chronologically.
    pub fn sort_key(&self) -> u32 {
        let key_year = match self.season {
            Season::Spring => self.year,
            _ => self.year + 1,
        };
        u32::from(key_year) * 10 + u32::from(self.season.ordinal())
    }

    /// Value of the site's `ViewSem` query parameter, e.g. `Fall 2025`.
    pub fn view_name(&self) -> String {
        format!("{} {}", self.season.as_str(), self.year)
    }
}

impl FromStr for Semester {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "Fall 2025", "Summer 1 2025", "spring 2026".
        let trimmed = s.trim();
        let (season_part, year_part) = trimmed
            .rsplit_once(' ')
            .ok_or_else(|| format!("'{trimmed}' is not a valid semester (expected e.g. 'Fall 2025')"))?;
        let year: u16 = year_part
            .parse()
            .map_err(|_| format!("'{year_part}' is not a valid year"))?;
        let season = Season::from_str(season_part)?;
        Ok(Self { season, year })
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spring_key_keeps_calendar_year() {
        let sem = Semester::new(Season::Spring, 2025);
        assert_eq!(sem.semester_key(), "20254");
    }

    #[test]
    fn test_non_spring_key_shifts_year() {
        assert_eq!(Semester::new(Season::Fall, 2025).semester_key(), "20263");
        assert_eq!(Semester::new(Season::Summer1, 2026).semester_key(), "20271");
        assert_eq!(Semester::new(Season::Summer2, 2026).semester_key(), "20272");
    }

    #[test]
    fn test_sort_key_orders_chronologically() {
        let spring25 = Semester::new(Season::Spring, 2025);
        let fall25 = Semester::new(Season::Fall, 2025);
        let spring26 = Semester::new(Season::Spring, 2026);
        assert!(spring25.sort_key() < fall25.sort_key());
        assert!(spring26.sort_key() < fall25.sort_key() + 10);
    }

    #[test]
    fn test_parse_semester_variants() {
        assert_eq!(
            "Fall 2025".parse::<Semester>().unwrap(),
            Semester::new(Season::Fall, 2025)
        );
        assert_eq!(
            "Summer 1 2026".parse::<Semester>().unwrap(),
            Semester::new(Season::Summer1, 2026)
        );
        assert_eq!(
            "spring 2027".parse::<Semester>().unwrap(),
            Semester::new(Season::Spring, 2027)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("Fall".parse::<Semester>().is_err());
        assert!("Fall twentytwentyfive".parse::<Semester>().is_err());
        assert!("Winter 2025".parse::<Semester>().is_err());
    }

    #[test]
    fn test_view_name() {
        assert_eq!(Semester::new(Season::Summer2, 2025).view_name(), "Summer2 2025");
    }
}
