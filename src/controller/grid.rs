//! Topic Grid
//!
//! The application panel's row model: one publish row and one subscription
//! row per topic, ids `publish{N}` / `subscription{N}` for N in 1..=count.
//! Rows are destroyed and recreated on every reset. The armed flag is the
//! analogue of an attached click handler: a disarmed row ignores clicks.

use crate::config::TopicsConfig;

/// Idle label shown on publish rows.
pub const CLICK_TO_PUBLISH: &str = "click to publish";
/// Idle label shown on subscription rows.
pub const CLICK_TO_SUBSCRIBE: &str = "click to subscribe";

/// Row background colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowColor {
    /// Own action succeeded.
    Yellow,
    /// An arrived message that was self-originated.
    Orange,
    /// Action permanently refused.
    Red,
}

/// Which half of the grid a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Publish,
    Subscription,
}

/// One grid row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Element id, `publish{N}` or `subscription{N}`
    pub id: String,
    /// Row kind
    pub kind: RowKind,
    /// Topic the row acts on
    pub topic: String,
    /// Current label text
    pub label: String,
    /// Current background color, if any
    pub color: Option<RowColor>,
    /// Whether the row still reacts to clicks
    pub armed: bool,
}

impl Row {
    fn idle(kind: RowKind, n: usize, topic: String) -> Self {
        let (id, label) = match kind {
            RowKind::Publish => (
                format!("publish{}", n),
                format!("{} to {}", CLICK_TO_PUBLISH, topic),
            ),
            RowKind::Subscription => (
                format!("subscription{}", n),
                format!("{} to {}", CLICK_TO_SUBSCRIBE, topic),
            ),
        };
        Self {
            id,
            kind,
            topic,
            label,
            color: None,
            armed: true,
        }
    }
}

/// The full topic grid.
pub struct TopicGrid {
    prefix: String,
    count: usize,
    publish: Vec<Row>,
    subscription: Vec<Row>,
}

impl TopicGrid {
    /// Create a grid with freshly reset rows.
    pub fn new(topics: &TopicsConfig) -> Self {
        let mut grid = Self {
            prefix: topics.prefix.clone(),
            count: topics.count,
            publish: Vec::new(),
            subscription: Vec::new(),
        };
        grid.reset();
        grid
    }

    /// Destroy and recreate every row in the idle state.
    pub fn reset(&mut self) {
        self.publish = (1..=self.count)
            .map(|n| Row::idle(RowKind::Publish, n, self.topic(n)))
            .collect();
        self.subscription = (1..=self.count)
            .map(|n| Row::idle(RowKind::Subscription, n, self.topic(n)))
            .collect();
    }

    /// Number of topics (rows per half).
    pub fn count(&self) -> usize {
        self.count
    }

    /// Derived topic name for row `n` (1-based).
    pub fn topic(&self, n: usize) -> String {
        format!("{}{}", self.prefix, n)
    }

    /// Map a topic name back to its row number, if it belongs to the grid.
    pub fn row_for_topic(&self, topic: &str) -> Option<usize> {
        let n: usize = topic.strip_prefix(&self.prefix)?.parse().ok()?;
        (1..=self.count).contains(&n).then_some(n)
    }

    /// Publish row `n` (1-based).
    pub fn publish_row(&self, n: usize) -> Option<&Row> {
        self.publish.get(n.checked_sub(1)?)
    }

    /// Subscription row `n` (1-based).
    pub fn subscription_row(&self, n: usize) -> Option<&Row> {
        self.subscription.get(n.checked_sub(1)?)
    }

    pub(crate) fn publish_row_mut(&mut self, n: usize) -> Option<&mut Row> {
        self.publish.get_mut(n.checked_sub(1)?)
    }

    pub(crate) fn subscription_row_mut(&mut self, n: usize) -> Option<&mut Row> {
        self.subscription.get_mut(n.checked_sub(1)?)
    }

    /// All rows, publish half first.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.publish.iter().chain(self.subscription.iter())
    }
}
