// Card grid layout domain model
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Cards may only live in the first two rows of the grid.
pub const MAX_ROW: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutEntry {
    #[serde(rename = "i")]
    pub id: String,
    pub x: u32,
    pub y: u32,
    #[serde(default = "unit_span")]
    pub w: u32,
    #[serde(default = "unit_span")]
    pub h: u32,
}

fn unit_span() -> u32 {
    1
}

impl LayoutEntry {
    pub fn new(id: impl Into<String>, x: u32, y: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w: 1,
            h: 1,
        }
    }
}

pub type Layout = Vec<LayoutEntry>;

/// Which card grid a layout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutView {
    Main,
    OrView,
}

impl LayoutView {
    pub const ALL: [LayoutView; 2] = [LayoutView::Main, LayoutView::OrView];

    pub fn storage_key(&self) -> &'static str {
        match self {
            LayoutView::Main => "cardsLayout",
            LayoutView::OrView => "viewCardsLayout",
        }
    }
}

impl std::str::FromStr for LayoutView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(LayoutView::Main),
            "or-view" => Ok(LayoutView::OrView),
            other => Err(format!("unknown layout view: {}", other)),
        }
    }
}

/// Metric id -> whether its card is shown.
pub type VisibilityMap = BTreeMap<String, bool>;

pub const DEFAULT_CARD_IDS: [&str; 11] = [
    "MAP", "PAP", "CVP", "AOP", "IVC", "LH", "RH", "LAP", "RAP", "LCO", "RCO",
];

pub fn default_visibility() -> VisibilityMap {
    DEFAULT_CARD_IDS
        .iter()
        .map(|id| (id.to_string(), true))
        .collect()
}

/// Visible card ids in catalogue order, followed by any extra ids the user
/// enabled that are not in the catalogue.
pub fn visible_card_ids(visibility: &VisibilityMap) -> Vec<String> {
    let mut ids: Vec<String> = DEFAULT_CARD_IDS
        .iter()
        .filter(|id| visibility.get(**id).copied().unwrap_or(false))
        .map(|id| id.to_string())
        .collect();

    for (id, visible) in visibility {
        if *visible && !DEFAULT_CARD_IDS.contains(&id.as_str()) {
            ids.push(id.clone());
        }
    }
    ids
}

/// Add entries for newly visible cards and drop entries for hidden ones.
///
/// A new card goes into whichever of the two rows holds fewer cards (row 0
/// on a tie), at the lowest free column of that row. Returns the new layout
/// and whether anything changed.
pub fn reconcile(visible_ids: &[String], current: &[LayoutEntry]) -> (Layout, bool) {
    let visible: HashSet<&str> = visible_ids.iter().map(String::as_str).collect();

    let mut layout: Layout = current
        .iter()
        .filter(|entry| visible.contains(entry.id.as_str()))
        .cloned()
        .collect();
    let mut changed = layout.len() != current.len();

    for id in visible_ids {
        if layout.iter().any(|entry| &entry.id == id) {
            continue;
        }

        let row0 = layout.iter().filter(|e| e.y == 0).count();
        let row1 = layout.iter().filter(|e| e.y == 1).count();
        let row = if row0 <= row1 { 0 } else { 1 };

        let x = next_free_column(&layout, row);
        layout.push(LayoutEntry::new(id.clone(), x, row));
        changed = true;
    }

    (layout, changed)
}

fn next_free_column(layout: &[LayoutEntry], row: u32) -> u32 {
    let taken: HashSet<u32> = layout
        .iter()
        .filter(|e| e.y == row)
        .map(|e| e.x)
        .collect();
    (0..).find(|x| !taken.contains(x)).unwrap_or(0)
}

/// Correct out-of-range drags rather than rejecting them.
pub fn clamp_user_layout(layout: Layout) -> Layout {
    layout
        .into_iter()
        .map(|mut entry| {
            entry.y = entry.y.min(MAX_ROW);
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("card{}", i)).collect()
    }

    #[test]
    fn test_seven_cards_balance_two_rows() {
        let (layout, changed) = reconcile(&ids(7), &[]);
        assert!(changed);
        assert_eq!(layout.len(), 7);
        assert!(layout.iter().all(|e| e.y <= MAX_ROW));

        let row0 = layout.iter().filter(|e| e.y == 0).count();
        let row1 = layout.iter().filter(|e| e.y == 1).count();
        assert!(row0.abs_diff(row1) <= 1);

        let cells: HashSet<(u32, u32)> = layout.iter().map(|e| (e.x, e.y)).collect();
        assert_eq!(cells.len(), 7);
    }

    #[test]
    fn test_hidden_cards_are_removed() {
        let (layout, _) = reconcile(&ids(4), &[]);
        let visible = vec!["card0".to_string(), "card2".to_string()];
        let (layout, changed) = reconcile(&visible, &layout);
        assert!(changed);
        assert_eq!(
            layout.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["card0", "card2"]
        );
    }

    #[test]
    fn test_stable_layout_is_unchanged() {
        let (layout, _) = reconcile(&ids(3), &[]);
        let (again, changed) = reconcile(&ids(3), &layout);
        assert!(!changed);
        assert_eq!(again, layout);
    }

    #[test]
    fn test_new_card_fills_gap_left_by_removed_card() {
        let current = vec![
            LayoutEntry::new("a", 0, 0),
            LayoutEntry::new("b", 2, 0),
            LayoutEntry::new("c", 0, 1),
            LayoutEntry::new("d", 1, 1),
        ];
        let visible: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let (layout, changed) = reconcile(&visible, &current);
        assert!(changed);
        let e = layout.iter().find(|e| e.id == "e").unwrap();
        assert_eq!((e.x, e.y), (1, 0));
    }

    #[test]
    fn test_clamp_user_layout() {
        let layout = vec![LayoutEntry::new("a", 0, 5), LayoutEntry::new("b", 3, 1)];
        let clamped = clamp_user_layout(layout);
        assert_eq!(clamped[0].y, 1);
        assert_eq!(clamped[1].y, 1);
        assert_eq!(clamped[1].x, 3);
    }

    #[test]
    fn test_visible_card_ids_order() {
        let mut visibility = default_visibility();
        visibility.insert("PAP".to_string(), false);
        visibility.insert("EXTRA".to_string(), true);
        let ids = visible_card_ids(&visibility);
        assert_eq!(ids.first().map(String::as_str), Some("MAP"));
        assert!(!ids.contains(&"PAP".to_string()));
        assert_eq!(ids.last().map(String::as_str), Some("EXTRA"));
        assert_eq!(ids.len(), 11);
    }

    #[test]
    fn test_layout_entry_wire_format() {
        let entry: LayoutEntry = serde_json::from_str(r#"{"i":"MAP","x":2,"y":1}"#).unwrap();
        assert_eq!(entry, LayoutEntry::new("MAP", 2, 1));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["i"], "MAP");
    }
}
