//! Composable read filters.
//!
//! A [`Query`] is built from opaque predicates, ordering keys and pagination.
//! Repositories count with the predicates only and fetch with ordering and
//! pagination applied on top.

use crate::core::{CmsError, EntityId, FieldValue, Result, SiteId};
use crate::entities::{Entity, Publishable, SectionEntity, SiteEntity};
use std::cmp::Ordering;
use std::sync::Arc;

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

pub struct Query<T> {
    predicates: Vec<Predicate<T>>,
    ids: Option<Vec<EntityId>>,
    ordering: Vec<Comparator<T>>,
    skip: Option<usize>,
    take: Option<usize>,
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            ids: None,
            ordering: Vec::new(),
            skip: None,
            take: None,
        }
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
            ids: self.ids.clone(),
            ordering: self.ordering.clone(),
            skip: self.skip,
            take: self.take,
        }
    }
}

impl<T: Entity> Query<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Restricts to the given ids (checked in storage, before decoding).
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn order_by<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.ordering
            .push(Arc::new(move |a: &T, b: &T| key(a).cmp(&key(b))));
        self
    }

    pub fn order_by_desc<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.ordering
            .push(Arc::new(move |a: &T, b: &T| key(b).cmp(&key(a))));
        self
    }

    /// Orders by a named field of [`Entity::fields`].
    pub fn order_by_field(mut self, name: &str, descending: bool) -> Result<Self> {
        let known = T::default().fields().iter().any(|field| field.name == name);
        if !known {
            return Err(CmsError::Configuration(format!(
                "unknown order field '{}' for {}",
                name,
                T::type_name()
            )));
        }

        let name = name.to_string();
        self.ordering.push(Arc::new(move |a: &T, b: &T| {
            let ord = field_value(a, &name).compare(&field_value(b, &name));
            if descending { ord.reverse() } else { ord }
        }));
        Ok(self)
    }

    /// Parses a free-text order string such as `"-date_added,title"`.
    /// A leading `-` sorts descending.
    pub fn order_by_str(mut self, order: &str) -> Result<Self> {
        for part in order.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, descending) = match part.strip_prefix('-') {
                Some(name) => (name, true),
                None => (part.strip_prefix('+').unwrap_or(part), false),
            };
            self = self.order_by_field(name.trim(), descending)?;
        }
        Ok(self)
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.skip = Some(count);
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }

    /// One-based page of `per_page` items.
    pub fn page(self, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        self.skip((page - 1).saturating_mul(per_page)).take(per_page)
    }

    pub fn ids(&self) -> Option<&[EntityId]> {
        self.ids.as_deref()
    }

    pub fn is_paginated(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    pub fn matches(&self, item: &T) -> bool {
        let id_ok = match &self.ids {
            Some(ids) => ids.contains(&item.id()),
            None => true,
        };
        id_ok && self.predicates.iter().all(|predicate| predicate(item))
    }

    /// Sorts stably; rows without ordering keep storage order.
    pub fn sort(&self, items: &mut [T]) {
        if self.ordering.is_empty() {
            return;
        }
        items.sort_by(|a, b| {
            self.ordering
                .iter()
                .map(|compare| compare(a, b))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    pub fn paginate(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.unwrap_or(0);
        let iter = items.into_iter().skip(skip);
        match self.take {
            Some(take) => iter.take(take).collect(),
            None => iter.collect(),
        }
    }
}

impl<T: SiteEntity> Query<T> {
    pub fn for_site(self, site_id: SiteId) -> Self {
        self.filter(move |item: &T| item.site_ids().contains(&site_id))
    }
}

impl<T: SectionEntity> Query<T> {
    pub fn in_section(self, section_id: EntityId) -> Self {
        self.filter(move |item: &T| item.section_ids().contains(&section_id))
    }

    pub fn with_tag(self, tag_id: EntityId) -> Self {
        self.filter(move |item: &T| item.tag_ids().contains(&tag_id))
    }
}

impl<T: Publishable> Query<T> {
    pub fn published(self) -> Self {
        self.filter(|item: &T| item.is_published())
    }
}

fn field_value<T: Entity>(item: &T, name: &str) -> FieldValue {
    item.field(name)
        .map(|field| field.value)
        .unwrap_or(FieldValue::Null)
}
