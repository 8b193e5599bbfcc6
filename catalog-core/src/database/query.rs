//! Criteria to SQL translation
//!
//! Documents live as JSON in a `doc` column. Each criterion becomes one
//! predicate over `json_extract(doc, ...)`; the predicates are joined with
//! AND (every criterion must match) or OR (any criterion may match).
//! Values are always bound, only static property names are spliced in.

use super::criteria::{
    BinaryOperator, Condition, Criteria, NumberOperator, StringOperator, TagOperator, Value,
};
use super::models::{EntityField, Id, OrderDirection};
use super::tag_tree::TagTree;
use crate::error::Result;
use sqlx::{QueryBuilder, Sqlite};

/// SQL expression reading a top-level property of the document
pub(crate) fn json_field(property: &str) -> String {
    format!("json_extract(doc, '$.{}')", property)
}

/// Append `ORDER BY` on a document property; insertion order breaks ties
pub(crate) fn push_order(qb: &mut QueryBuilder<'_, Sqlite>, property: &str, dir: OrderDirection) {
    qb.push(" ORDER BY ")
        .push(json_field(property))
        .push(" ")
        .push(dir.as_sql())
        .push(", seq ASC");
}

/// Append a `WHERE` clause combining every criterion, or nothing when empty
pub(crate) fn push_criteria(
    qb: &mut QueryBuilder<'_, Sqlite>,
    criteria: &[Criteria],
    match_any: bool,
    tags: &TagTree,
) -> Result<()> {
    if criteria.is_empty() {
        return Ok(());
    }

    let joiner = if match_any { " OR " } else { " AND " };
    qb.push(" WHERE ");
    for (i, crit) in criteria.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        qb.push("(");
        push_criterion(qb, crit, tags)?;
        qb.push(")");
    }

    Ok(())
}

/// Append a `WHERE` clause for a single exact-match condition
pub(crate) fn push_condition<F: EntityField>(
    qb: &mut QueryBuilder<'_, Sqlite>,
    condition: &Condition<F>,
) -> Result<()> {
    qb.push(" WHERE ");
    match condition {
        Condition::Equals(field, value) if field.is_array() => {
            push_array_predicate(qb, field.property(), std::slice::from_ref(value), false)?;
        }
        Condition::Equals(field, value) => {
            qb.push(json_field(field.property())).push(" = ");
            push_value(qb, value);
        }
        Condition::StartsWith(field, prefix) => {
            push_string_predicate(qb, field.property(), StringOperator::StartsWith, prefix);
        }
        Condition::Contains(field, values) => {
            push_array_predicate(qb, field.property(), values, false)?;
        }
    }
    Ok(())
}

fn push_criterion(
    qb: &mut QueryBuilder<'_, Sqlite>,
    criteria: &Criteria,
    tags: &TagTree,
) -> Result<()> {
    let property = criteria.key().property();
    match criteria {
        Criteria::Text {
            operator, value, ..
        } => push_string_predicate(qb, property, *operator, value),
        Criteria::Number {
            operator, value, ..
        } => {
            qb.push(json_field(property))
                .push(number_operator_sql(*operator))
                .push_bind(*value);
        }
        Criteria::Date {
            operator, value, ..
        } => {
            // Stored as Unix milliseconds; compared as UTC calendar days
            qb.push(format!("date({} / 1000, 'unixepoch')", json_field(property)))
                .push(number_operator_sql(*operator))
                .push_bind(value.format("%Y-%m-%d").to_string());
        }
        Criteria::Extension { operator, value } => {
            let op = match operator {
                BinaryOperator::Equals => " = ",
                BinaryOperator::NotEqual => " <> ",
            };
            qb.push(json_field(property))
                .push(op)
                .push_bind(value.clone());
        }
        Criteria::Tags { operator, value } => {
            let ids: Vec<Id> = match value {
                None => Vec::new(),
                Some(id) if operator.is_recursive() => tags.descendants(id),
                Some(id) => vec![id.clone()],
            };
            let values: Vec<Value> = ids.into_iter().map(Value::Text).collect();
            push_array_predicate(qb, property, &values, operator.is_negated())?;
        }
    }
    Ok(())
}

fn push_string_predicate(
    qb: &mut QueryBuilder<'_, Sqlite>,
    property: &str,
    operator: StringOperator,
    value: &str,
) {
    let field = json_field(property);

    // instr() with an empty needle is not worth relying on
    if value.is_empty() {
        let always = matches!(
            operator,
            StringOperator::Contains | StringOperator::StartsWith
        );
        match operator {
            StringOperator::Equals => {
                qb.push(field).push(" = ''");
            }
            StringOperator::NotEqual => {
                qb.push(field).push(" <> ''");
            }
            _ => {
                qb.push(if always { "1" } else { "0" });
            }
        }
        return;
    }

    match operator {
        StringOperator::Equals => {
            qb.push(field).push(" = ").push_bind(value.to_string());
        }
        StringOperator::NotEqual => {
            qb.push(field).push(" <> ").push_bind(value.to_string());
        }
        StringOperator::Contains => {
            qb.push(format!("instr(lower({}), lower(", field))
                .push_bind(value.to_string())
                .push(")) > 0");
        }
        StringOperator::NotContains => {
            qb.push(format!("instr(lower({}), lower(", field))
                .push_bind(value.to_string())
                .push(")) = 0");
        }
        // First occurrence at position 1 means the value is a prefix
        StringOperator::StartsWith => {
            qb.push(format!("instr({}, ", field))
                .push_bind(value.to_string())
                .push(") = 1");
        }
        StringOperator::NotStartsWith => {
            qb.push(format!("instr({}, ", field))
                .push_bind(value.to_string())
                .push(") <> 1");
        }
    }
}

/// Array property intersects (or, negated, is disjoint from) `values`.
/// An empty list tests for an empty (or, negated, non-empty) array.
fn push_array_predicate(
    qb: &mut QueryBuilder<'_, Sqlite>,
    property: &str,
    values: &[Value],
    negated: bool,
) -> Result<()> {
    if values.is_empty() {
        qb.push(format!(
            "COALESCE(json_array_length(doc, '$.{}'), 0) {}",
            property,
            if negated { "> 0" } else { "= 0" }
        ));
        return Ok(());
    }

    let list = serde_json::to_string(values)?;
    qb.push(if negated { "NOT EXISTS" } else { "EXISTS" })
        .push(format!(
            " (SELECT 1 FROM json_each(doc, '$.{}') AS elem \
             WHERE elem.value IN (SELECT value FROM json_each(",
            property
        ))
        .push_bind(list)
        .push(")))");
    Ok(())
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Text(text) => {
            qb.push_bind(text.clone());
        }
        Value::Number(number) => {
            qb.push_bind(*number);
        }
        Value::Bool(flag) => {
            qb.push_bind(*flag);
        }
    }
}

fn number_operator_sql(operator: NumberOperator) -> &'static str {
    match operator {
        NumberOperator::Equals => " = ",
        NumberOperator::NotEqual => " <> ",
        NumberOperator::SmallerThan => " < ",
        NumberOperator::SmallerThanOrEquals => " <= ",
        NumberOperator::GreaterThan => " > ",
        NumberOperator::GreaterThanOrEquals => " >= ",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::criteria::{NumberKey, TextKey};
    use crate::database::models::{FileField, Tag};

    fn sql_for(criteria: &[Criteria], match_any: bool, tags: &TagTree) -> String {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM files");
        push_criteria(&mut qb, criteria, match_any, tags).unwrap();
        qb.sql().to_string()
    }

    #[test]
    fn test_empty_criteria_has_no_where_clause() {
        assert_eq!(sql_for(&[], false, &TagTree::default()), "SELECT doc FROM files");
    }

    #[test]
    fn test_criteria_joined_by_match_mode() {
        let criteria = vec![
            Criteria::text(TextKey::Name, StringOperator::Contains, "cat"),
            Criteria::number(NumberKey::Width, NumberOperator::GreaterThan, 100.0),
        ];
        let all = sql_for(&criteria, false, &TagTree::default());
        assert!(all.contains(") AND ("));
        let any = sql_for(&criteria, true, &TagTree::default());
        assert!(any.contains(") OR ("));
        assert!(any.contains("json_extract(doc, '$.width') > ?"));
    }

    #[test]
    fn test_untagged_criteria_checks_array_length() {
        let sql = sql_for(
            &[Criteria::tag(TagOperator::Contains, None)],
            false,
            &TagTree::default(),
        );
        assert!(sql.contains("COALESCE(json_array_length(doc, '$.tags'), 0) = 0"));
    }

    #[test]
    fn test_negated_tag_criteria_uses_not_exists() {
        let tree = TagTree::new(vec![Tag::new("a", "A")]);
        let sql = sql_for(
            &[Criteria::tag(TagOperator::NotContainsRecursively, Some("a".into()))],
            false,
            &tree,
        );
        assert!(sql.contains("NOT EXISTS (SELECT 1 FROM json_each(doc, '$.tags')"));
    }

    #[test]
    fn test_condition_starts_with() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM files");
        push_condition(
            &mut qb,
            &Condition::StartsWith(FileField::AbsolutePath, "/photos".to_string()),
        )
        .unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT doc FROM files WHERE instr(json_extract(doc, '$.absolutePath'), ?) = 1"
        );
    }

    #[test]
    fn test_condition_equals_on_array_checks_membership() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT doc FROM files");
        push_condition(&mut qb, &Condition::Equals(FileField::Tags, "t1".into())).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT doc FROM files WHERE EXISTS (SELECT 1 FROM json_each(doc, '$.tags') AS elem \
             WHERE elem.value IN (SELECT value FROM json_each(?)))"
        );
    }
}
