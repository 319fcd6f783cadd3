use crate::core::{FieldKind, FieldValue};
use crate::entities::Entity;
use serde::{Deserialize, Serialize};

/// One field that differs between the stored snapshot and the updated item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub name: String,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

/// Fields the pipeline stamps itself; never reported as changes.
const STAMPED: &[&str] = &["date_updated"];

/// Field-by-field diff of two snapshots by value equality. Scalar fields come
/// first, relation-like fields after, each in declaration order.
pub fn compute_changes<T: Entity>(old: &T, new: &T) -> Vec<PropertyChange> {
    let old_fields = old.fields();
    let new_fields = new.fields();

    let mut scalars = Vec::new();
    let mut relations = Vec::new();
    for field in new_fields {
        if STAMPED.contains(&field.name) {
            continue;
        }
        let old_value = old_fields
            .iter()
            .find(|candidate| candidate.name == field.name)
            .map(|candidate| candidate.value.clone())
            .unwrap_or(FieldValue::Null);
        if old_value == field.value {
            continue;
        }

        let change = PropertyChange {
            name: field.name.to_string(),
            old_value,
            new_value: field.value,
        };
        match field.kind {
            FieldKind::Scalar => scalars.push(change),
            FieldKind::Relation => relations.push(change),
        }
    }

    scalars.extend(relations);
    scalars
}
