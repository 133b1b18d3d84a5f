/// A professional track. The exam flow is the same for every track; only the
/// question bank and the labels differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specialization {
    pub key: &'static str,
    pub title: &'static str,
}

pub static SPECIALIZATIONS: [Specialization; 11] = [
    Specialization {
        key: "oupds",
        title: "ОУПДС",
    },
    Specialization {
        key: "ispolniteli",
        title: "Судебные приставы-исполнители",
    },
    Specialization {
        key: "aliment",
        title: "Алименты",
    },
    Specialization {
        key: "doznanie",
        title: "Дознание",
    },
    Specialization {
        key: "rozyisk",
        title: "Розыск",
    },
    Specialization {
        key: "prof",
        title: "Профессиональная подготовка",
    },
    Specialization {
        key: "oko",
        title: "ОКО",
    },
    Specialization {
        key: "informatika",
        title: "Информатизация",
    },
    Specialization {
        key: "kadry",
        title: "Кадры",
    },
    Specialization {
        key: "bezopasnost",
        title: "Безопасность",
    },
    Specialization {
        key: "upravlenie",
        title: "Управление",
    },
];

pub fn find(key: &str) -> Option<&'static Specialization> {
    SPECIALIZATIONS.iter().find(|s| s.key == key)
}

/// Display title for a key, falling back to the key itself for tracks that
/// were removed from the table after results were stored.
pub fn title_of(key: &str) -> &str {
    find(key).map(|s| s.title).unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<_> = SPECIALIZATIONS.iter().map(|s| s.key).collect();
        assert_eq!(keys.len(), SPECIALIZATIONS.len());
    }

    #[test]
    fn unknown_key_falls_back_to_itself() {
        assert_eq!(title_of("kadry"), "Кадры");
        assert_eq!(title_of("gone"), "gone");
        assert!(find("gone").is_none());
    }
}
