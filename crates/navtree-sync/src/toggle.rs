//! Sync toggle control labels.

use navtree::ParsedFragment;

/// Label shown while sync is on.
pub const SYNC_ON_MESSAGE: &str = "click to disable panel synchronisation";
/// Label shown while sync is off.
pub const SYNC_OFF_MESSAGE: &str = "click to enable panel synchronisation";

const SYNC_ON_VARIABLE: &str = "SYNCONMSG";
const SYNC_OFF_VARIABLE: &str = "SYNCOFFMSG";

/// Tooltip labels of the control that switches synchronisation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncToggle {
    on_label: String,
    off_label: String,
}

impl Default for SyncToggle {
    fn default() -> Self {
        Self {
            on_label: SYNC_ON_MESSAGE.to_owned(),
            off_label: SYNC_OFF_MESSAGE.to_owned(),
        }
    }
}

impl SyncToggle {
    /// Labels from `SYNCONMSG`/`SYNCOFFMSG` in the root fragment, defaults
    /// for whichever is missing.
    #[must_use]
    pub fn from_fragment(fragment: &ParsedFragment) -> Self {
        let defaults = Self::default();
        Self {
            on_label: fragment
                .string(SYNC_ON_VARIABLE)
                .map_or(defaults.on_label, str::to_owned),
            off_label: fragment
                .string(SYNC_OFF_VARIABLE)
                .map_or(defaults.off_label, str::to_owned),
        }
    }

    /// Label describing what clicking the control does in the given state.
    #[must_use]
    pub fn label(&self, enabled: bool) -> &str {
        if enabled { &self.on_label } else { &self.off_label }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_labels() {
        let toggle = SyncToggle::default();

        assert_eq!(toggle.label(true), "click to disable panel synchronisation");
        assert_eq!(toggle.label(false), "click to enable panel synchronisation");
    }

    #[test]
    fn test_labels_from_fragment() {
        let fragment = ParsedFragment::parse(
            "navtreedata",
            "var NAVTREE = [];\nvar SYNCONMSG = 'Sync an';\nvar SYNCOFFMSG = 'Sync aus';",
        )
        .unwrap();

        let toggle = SyncToggle::from_fragment(&fragment);

        assert_eq!(toggle.label(true), "Sync an");
        assert_eq!(toggle.label(false), "Sync aus");
    }

    #[test]
    fn test_missing_label_falls_back() {
        let fragment =
            ParsedFragment::parse("navtreedata", "var SYNCONMSG = 'Sync an';").unwrap();

        let toggle = SyncToggle::from_fragment(&fragment);

        assert_eq!(toggle.label(true), "Sync an");
        assert_eq!(toggle.label(false), SYNC_OFF_MESSAGE);
    }
}
