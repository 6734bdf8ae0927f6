//! Strategies to pick the timestamp a message is synchronized on.

use crate::{
    error::{Result, SyncError},
    message::{Message, Timestamp, names},
};
use itertools::Itertools;
use std::{fmt, sync::Arc};

/// Selects a named timestamp from a message.
pub trait TimestampSelector: fmt::Debug + Send + Sync {
    /// Returns the selected timestamp together with the name it was
    /// found under.
    fn select(&self, message: &Message) -> Result<(Timestamp, &str)>;

    fn timestamp(&self, message: &Message) -> Result<Timestamp> {
        self.select(message).map(|(ts, _)| ts)
    }
}

/// Shared handle to a selector.
pub type SelectorRef = Arc<dyn TimestampSelector>;

/// The timestamps every message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemTimestamp {
    Create,
    Send,
    Receive,
    Deliver,
}

impl SystemTimestamp {
    pub fn name(self) -> &'static str {
        match self {
            SystemTimestamp::Create => names::CREATE,
            SystemTimestamp::Send => names::SEND,
            SystemTimestamp::Receive => names::RECEIVE,
            SystemTimestamp::Deliver => names::DELIVER,
        }
    }

    /// Resolves a full system name or its short alias.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            names::CREATE | "create" => SystemTimestamp::Create,
            names::SEND | "send" => SystemTimestamp::Send,
            names::RECEIVE | "receive" => SystemTimestamp::Receive,
            names::DELIVER | "deliver" => SystemTimestamp::Deliver,
            _ => return None,
        };
        Some(kind)
    }
}

/// Reads one of the fixed system timestamps. Never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemTimestampSelector(pub SystemTimestamp);

impl SystemTimestampSelector {
    pub fn create() -> Self {
        Self(SystemTimestamp::Create)
    }
}

impl TimestampSelector for SystemTimestampSelector {
    fn select(&self, message: &Message) -> Result<(Timestamp, &str)> {
        let ts = message.timestamps();
        let value = match self.0 {
            SystemTimestamp::Create => ts.create,
            SystemTimestamp::Send => ts.send,
            SystemTimestamp::Receive => ts.receive,
            SystemTimestamp::Deliver => ts.deliver,
        };
        Ok((value, self.0.name()))
    }
}

/// Reads a user-defined timestamp by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTimestampSelector {
    name: String,
}

impl UserTimestampSelector {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TimestampSelector for UserTimestampSelector {
    fn select(&self, message: &Message) -> Result<(Timestamp, &str)> {
        let value = message
            .timestamps()
            .user(&self.name)
            .ok_or_else(|| SyncError::NoSuchTimestamp {
                name: self.name.clone(),
            })?;
        Ok((value, &self.name))
    }
}

/// Tries a list of selectors in order and returns the first hit.
///
/// This tolerates producers where some user timestamps are optional.
#[derive(Debug, Clone)]
pub struct PriorityTimestampSelector {
    selectors: Vec<SelectorRef>,
    description: String,
}

impl PriorityTimestampSelector {
    pub fn new(selectors: Vec<SelectorRef>) -> Self {
        let description = format!(
            "priority list [{}]",
            selectors.iter().map(|selector| format!("{selector:?}")).join(", ")
        );
        Self {
            selectors,
            description,
        }
    }

    pub fn selectors(&self) -> &[SelectorRef] {
        &self.selectors
    }
}

impl TimestampSelector for PriorityTimestampSelector {
    fn select(&self, message: &Message) -> Result<(Timestamp, &str)> {
        for selector in &self.selectors {
            match selector.select(message) {
                Ok(hit) => return Ok(hit),
                Err(SyncError::NoSuchTimestamp { .. }) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(SyncError::NoSuchTimestamp {
            name: self.description.clone(),
        })
    }
}

/// Creates the selector for a single timestamp name.
pub fn selector_from_name(name: &str) -> SelectorRef {
    match SystemTimestamp::from_name(name) {
        Some(kind) => Arc::new(SystemTimestampSelector(kind)),
        None => Arc::new(UserTimestampSelector::new(name)),
    }
}

/// Creates a selector from a priority-ordered list of timestamp names.
///
/// A single system name yields the fixed selector directly. Anything
/// else is wrapped in a [`PriorityTimestampSelector`] so that missing
/// user timestamps fall back to the next name.
pub fn selector_from_names<S>(names: &[S]) -> Result<SelectorRef>
where
    S: AsRef<str>,
{
    let names: Vec<&str> = names
        .iter()
        .map(|name| name.as_ref().trim())
        .filter(|name| !name.is_empty())
        .collect();

    match names.as_slice() {
        [] => Err(SyncError::InvalidConfig(
            "no valid timestamps specified".to_string(),
        )),
        [name] if SystemTimestamp::from_name(name).is_some() => Ok(selector_from_name(name)),
        names => {
            let selectors = names.iter().map(|name| selector_from_name(name)).collect();
            Ok(Arc::new(PriorityTimestampSelector::new(selectors)))
        }
    }
}

/// Parses a comma separated list such as `"camera,rsb::create"`.
pub fn selector_from_list(list: &str) -> Result<SelectorRef> {
    let names: Vec<&str> = list.split(',').collect();
    selector_from_names(&names)
}
