use super::{EngineError, RelationalEngine};
use crate::relation::{DataType, Field, Relation, Row, Schema, Value};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

/// In-memory engine. Joins build a hash index on the right relation and
/// probe it with the left, so output order follows the left input.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashJoinEngine;

struct JoinKey {
    left: usize,
    right: usize,
    /// Type both sides are compared in.
    data_type: DataType,
}

impl JoinKey {
    fn plan(left: &Relation, right: &Relation, on: &str) -> Result<Self, EngineError> {
        let left_index = left.schema().require(on)?;
        let right_index = right.schema().require(on)?;
        let left_type = left.schema().fields()[left_index].data_type;
        let right_type = right.schema().fields()[right_index].data_type;

        let data_type = if left_type == right_type {
            left_type
        } else if left_type.is_numeric() && right_type.is_numeric() {
            DataType::Float64
        } else if !has_keys(left, left_index) || !has_keys(right, right_index) {
            // Nothing can match, so the declared types are irrelevant.
            left_type
        } else {
            return Err(EngineError::KeyType {
                column: on.to_string(),
                left: left_type,
                right: right_type,
            });
        };

        Ok(Self {
            left: left_index,
            right: right_index,
            data_type,
        })
    }

    fn key<'a>(&self, value: &'a Value) -> Option<Cow<'a, Value>> {
        if value.is_null() {
            None
        } else if value.conforms_to(self.data_type) {
            Some(Cow::Borrowed(value))
        } else {
            Some(Cow::Owned(value.cast(self.data_type)))
        }
    }

    fn index<'a>(&self, right: &'a Relation) -> HashMap<Cow<'a, Value>, Vec<usize>> {
        let mut index: HashMap<Cow<'a, Value>, Vec<usize>> = HashMap::new();
        for (position, row) in right.rows().iter().enumerate() {
            if let Some(key) = self.key(&row[self.right]) {
                index.entry(key).or_default().push(position);
            }
        }
        index
    }
}

fn has_keys(relation: &Relation, index: usize) -> bool {
    relation.rows().iter().any(|row| !row[index].is_null())
}

fn without(row: &Row, skip: usize) -> impl Iterator<Item = Value> + '_ {
    row.iter()
        .enumerate()
        .filter(move |(position, _)| *position != skip)
        .map(|(_, value)| value.clone())
}

impl RelationalEngine for HashJoinEngine {
    fn inner_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &str,
    ) -> Result<Relation, EngineError> {
        let key = JoinKey::plan(left, right, on)?;
        let left_fields = left.schema().fields();
        let right_fields = right.schema().fields();

        let mut fields = Vec::with_capacity(left_fields.len() + right_fields.len() - 1);
        fields.push(Field {
            name: left_fields[key.left].name.clone(),
            data_type: key.data_type,
            nullable: false,
        });
        fields.extend(
            left_fields
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != key.left)
                .map(|(_, field)| field.clone()),
        );
        for (position, field) in right_fields.iter().enumerate() {
            if position == key.right {
                continue;
            }
            if left.schema().contains(&field.name) {
                return Err(EngineError::AmbiguousColumn(field.name.clone()));
            }
            fields.push(field.clone());
        }
        let schema = Schema::new(fields)?;

        let index = key.index(right);
        let mut rows = Vec::new();
        for left_row in left.rows() {
            let Some(probe) = key.key(&left_row[key.left]) else {
                continue;
            };
            let Some(matches) = index.get(probe.as_ref()) else {
                continue;
            };

            for &position in matches {
                let right_row = &right.rows()[position];
                let mut row = Vec::with_capacity(schema.len());
                row.push(probe.clone().into_owned());
                row.extend(without(left_row, key.left));
                row.extend(without(right_row, key.right));
                rows.push(row);
            }
        }

        Ok(Relation::from_parts(schema, rows))
    }

    fn left_anti_join(
        &self,
        left: &Relation,
        right: &Relation,
        on: &str,
    ) -> Result<Relation, EngineError> {
        let key = JoinKey::plan(left, right, on)?;
        let present: HashSet<Cow<'_, Value>> = right
            .rows()
            .iter()
            .filter_map(|row| key.key(&row[key.right]))
            .collect();

        let rows = left
            .rows()
            .iter()
            .filter(|row| match key.key(&row[key.left]) {
                Some(probe) => !present.contains(probe.as_ref()),
                None => true,
            })
            .cloned()
            .collect();

        Ok(Relation::from_parts(left.schema().clone(), rows))
    }

    fn select(&self, relation: &Relation, columns: &[&str]) -> Result<Relation, EngineError> {
        let indices = columns
            .iter()
            .map(|name| relation.schema().require(name))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = indices
            .iter()
            .map(|&index| relation.schema().fields()[index].clone())
            .collect();
        let schema = Schema::new(fields)?;

        let rows = relation
            .rows()
            .iter()
            .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
            .collect();

        Ok(Relation::from_parts(schema, rows))
    }

    fn with_literal_column(
        &self,
        relation: &Relation,
        name: &str,
        data_type: DataType,
        value: Value,
    ) -> Result<Relation, EngineError> {
        if relation.schema().contains(name) {
            return Err(EngineError::DuplicateColumn(name.to_string()));
        }
        if !value.conforms_to(data_type) {
            return Err(EngineError::LiteralType {
                column: name.to_string(),
                expected: data_type,
                value: value.to_string(),
            });
        }

        let mut fields = relation.schema().fields().to_vec();
        fields.push(Field::new(name, data_type).with_nullable(value.is_null()));
        let schema = Schema::new(fields)?;

        let rows = relation
            .rows()
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.push(value.clone());
                row
            })
            .collect();

        Ok(Relation::from_parts(schema, rows))
    }

    fn union_by_name(&self, left: &Relation, right: &Relation) -> Result<Relation, EngineError> {
        let left_schema = left.schema();
        let right_schema = right.schema();

        let mut left_names = left_schema.names();
        let mut right_names = right_schema.names();
        left_names.sort_unstable();
        right_names.sort_unstable();
        if left_names != right_names {
            return Err(EngineError::UnionColumns {
                left: left_schema.names().join(", "),
                right: right_schema.names().join(", "),
            });
        }

        let mut fields = Vec::with_capacity(left_schema.len());
        let mut right_positions = Vec::with_capacity(left_schema.len());
        for field in left_schema.fields() {
            let position = right_schema.require(&field.name)?;
            let other = &right_schema.fields()[position];
            fields.push(Field {
                name: field.name.clone(),
                data_type: field.data_type.widen(other.data_type),
                nullable: field.nullable || other.nullable,
            });
            right_positions.push(position);
        }
        let schema = Schema::new(fields)?;

        let mut rows: Vec<Row> = Vec::with_capacity(left.len() + right.len());
        rows.extend(left.rows().iter().map(|row| {
            row.iter()
                .zip(schema.fields())
                .map(|(value, field)| value.cast(field.data_type))
                .collect()
        }));
        rows.extend(right.rows().iter().map(|row| {
            right_positions
                .iter()
                .zip(schema.fields())
                .map(|(&position, field)| row[position].cast(field.data_type))
                .collect()
        }));

        Ok(Relation::from_parts(schema, rows))
    }
}
