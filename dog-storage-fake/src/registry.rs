use std::collections::{HashMap, VecDeque};

/// Name-keyed map that remembers insertion order for listing
#[derive(Debug)]
pub(crate) struct Registry<T> {
    entries: HashMap<String, T>,
    order: VecDeque<String>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert under a fresh name; hands the value back if the name is taken
    pub fn try_insert(&mut self, name: String, value: T) -> Result<(), T> {
        if self.entries.contains_key(&name) {
            return Err(value);
        }
        self.order.push_back(name.clone());
        self.entries.insert(name, value);
        Ok(())
    }

    /// Insert or overwrite in place, keeping the original position
    pub fn replace(&mut self, name: String, value: T) {
        if self.entries.insert(name.clone(), value).is_none() {
            self.order.push_back(name);
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<T> {
        let value = self.entries.remove(name)?;
        if let Some(pos) = self.order.iter().position(|n| n == name) {
            self.order.remove(pos);
        }
        Some(value)
    }

    /// Remove `name` only when `pred` holds for the registered value
    pub fn remove_if<F>(&mut self, name: &str, pred: F) -> Option<T>
    where
        F: FnOnce(&T) -> bool,
    {
        if self.entries.get(name).is_some_and(pred) {
            self.remove(name)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    /// Empty the registry, returning its values in insertion order
    pub fn drain(&mut self) -> Vec<T> {
        let mut entries = std::mem::take(&mut self.entries);
        std::mem::take(&mut self.order)
            .into_iter()
            .filter_map(|name| entries.remove(&name))
            .collect()
    }
}
