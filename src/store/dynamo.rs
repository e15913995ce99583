use crate::error::{Error, Result};
use crate::store::{Keys, Page, QueryRequest, Record, ScanRequest, SortCondition, Store};

use aws_sdk_dynamodb::{Client, types};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use serde_json::Value;
use std::{collections, fmt};

/// [`Store`] implementation over an Amazon DynamoDB table set.
///
/// Key conditions and filters are rendered as DynamoDB expression strings
/// with `#name`/`:value` placeholders; values cross the wire through
/// `serde_dynamo`. Query and scan issue a single request per call and
/// surface `LastEvaluatedKey` as the page's continuation token.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    /// Wrap a configured SDK client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct ExpressionInput {
    expression: String,
    expression_attribute_names: collections::HashMap<String, String>,
    expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    fn merge(operator: &str, items: Vec<Self>) -> Self {
        let mut merged = Self::default();
        for item in items {
            merged
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            merged
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            if merged.expression.is_empty() {
                merged.expression = item.expression;
            } else if !item.expression.is_empty() {
                merged.expression = format!(
                    "{left}{operator}{right}",
                    left = merged.expression,
                    right = item.expression
                );
            }
        }
        merged
    }
}

fn attribute_value(value: &Value) -> Result<types::AttributeValue> {
    to_attribute_value(value.clone()).map_err(|error| Error::Encoding(error.to_string()))
}

fn comparison(
    name: &str,
    operator: &str,
    suffix: &str,
    value: &Value,
    index: &mut usize,
    values: &mut collections::HashMap<String, types::AttributeValue>,
) -> Result<String> {
    let value_placeholder = format!(":{name}_{suffix}{index}");
    *index += 1;
    values.insert(value_placeholder.clone(), attribute_value(value)?);
    Ok(format!("#{name} {operator} {value_placeholder}"))
}

fn condition_expression(
    name: &str,
    condition: &SortCondition,
    index: &mut usize,
) -> Result<ExpressionInput> {
    let key_placeholder = format!("#{name}");
    let mut values = collections::HashMap::new();
    let expression = match condition {
        SortCondition::Eq(value) => comparison(name, "=", "eq", value, index, &mut values)?,
        SortCondition::Ge(value) => comparison(name, ">=", "gte", value, index, &mut values)?,
        SortCondition::Gt(value) => comparison(name, ">", "gt", value, index, &mut values)?,
        SortCondition::Le(value) => comparison(name, "<=", "lte", value, index, &mut values)?,
        SortCondition::Lt(value) => comparison(name, "<", "lt", value, index, &mut values)?,
        SortCondition::Between(low, high) => {
            let low_placeholder = format!(":{name}_between{index}");
            *index += 1;
            let high_placeholder = format!(":{name}_between{index}");
            *index += 1;
            values.insert(low_placeholder.clone(), attribute_value(low)?);
            values.insert(high_placeholder.clone(), attribute_value(high)?);
            format!("{key_placeholder} BETWEEN {low_placeholder} AND {high_placeholder}")
        }
    };
    Ok(ExpressionInput {
        expression,
        expression_attribute_names: collections::HashMap::from([(
            key_placeholder,
            name.to_string(),
        )]),
        expression_attribute_values: values,
    })
}

fn keys_to_item(keys: Keys) -> Result<collections::HashMap<String, types::AttributeValue>> {
    let partition_key_value = attribute_value(&keys.partition_key.value)?;
    let mut item =
        collections::HashMap::from([(keys.partition_key.name, partition_key_value)]);
    if let Some(sort_key) = keys.sort_key {
        let sort_key_value = attribute_value(&sort_key.value)?;
        item.insert(sort_key.name, sort_key_value);
    }
    Ok(item)
}

fn record_to_item(record: Record) -> Result<collections::HashMap<String, types::AttributeValue>> {
    to_item(record).map_err(|error| Error::Encoding(error.to_string()))
}

fn item_to_record(item: collections::HashMap<String, types::AttributeValue>) -> Result<Record> {
    from_item(item).map_err(|error| Error::Encoding(error.to_string()))
}

fn store_error<E: fmt::Display>(error: E) -> Error {
    Error::Store(error.to_string())
}

#[async_trait::async_trait]
impl Store for DynamoStore {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.store.get", skip_all, err)
    )]
    async fn get(&self, table: &str, keys: Keys) -> Result<Option<Record>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(keys_to_item(keys)?))
            .send()
            .await
            .map_err(store_error)?;
        output.item.map(item_to_record).transpose()
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.store.put", skip_all, err)
    )]
    async fn put(&self, table: &str, record: Record) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(record_to_item(record)?))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.store.delete", skip_all, err)
    )]
    async fn delete(&self, table: &str, keys: Keys) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(keys_to_item(keys)?))
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.store.query", skip_all, err)
    )]
    async fn query(&self, request: QueryRequest) -> Result<Page> {
        let mut index = 0;
        let partition_condition = SortCondition::Eq(request.partition.value);
        let mut parts = vec![condition_expression(
            &request.partition.name,
            &partition_condition,
            &mut index,
        )?];
        if let Some((name, condition)) = &request.sort {
            parts.push(condition_expression(name, condition, &mut index)?);
        }
        let merged = ExpressionInput::merge(" AND ", parts);
        let exclusive_start_key = request.exclusive_start_key.map(record_to_item).transpose()?;
        let output = self
            .client
            .query()
            .table_name(request.table)
            .set_index_name(request.index)
            .key_condition_expression(merged.expression)
            .set_expression_attribute_names(Some(merged.expression_attribute_names))
            .set_expression_attribute_values(Some(merged.expression_attribute_values))
            .set_exclusive_start_key(exclusive_start_key)
            .limit(request.limit)
            .scan_index_forward(request.ascending)
            .send()
            .await
            .map_err(store_error)?;
        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_to_record)
            .collect::<Result<Vec<_>>>()?;
        let last_key = output.last_evaluated_key.map(item_to_record).transpose()?;
        Ok(Page { items, last_key })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_entity.store.scan", skip_all, err)
    )]
    async fn scan(&self, request: ScanRequest) -> Result<Page> {
        let mut index = 0;
        let mut parts = Vec::with_capacity(request.filters.len());
        for (name, condition) in &request.filters {
            parts.push(condition_expression(name, condition, &mut index)?);
        }
        let exclusive_start_key = request.exclusive_start_key.map(record_to_item).transpose()?;
        let mut builder = self
            .client
            .scan()
            .table_name(request.table)
            .set_index_name(request.index)
            .set_exclusive_start_key(exclusive_start_key)
            .limit(request.limit);
        if !parts.is_empty() {
            let merged = ExpressionInput::merge(" AND ", parts);
            builder = builder
                .filter_expression(merged.expression)
                .set_expression_attribute_names(Some(merged.expression_attribute_names))
                .set_expression_attribute_values(Some(merged.expression_attribute_values));
        }
        let output = builder.send().await.map_err(store_error)?;
        let items = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(item_to_record)
            .collect::<Result<Vec<_>>>()?;
        let last_key = output.last_evaluated_key.map(item_to_record).transpose()?;
        Ok(Page { items, last_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::eq(
        SortCondition::Eq(json!("b")),
        "#a = :a_eq0",
        collections::HashMap::from([(":a_eq0".to_string(), types::AttributeValue::S("b".to_string()))])
    )]
    #[case::gt(
        SortCondition::Gt(json!(7)),
        "#a > :a_gt0",
        collections::HashMap::from([(":a_gt0".to_string(), types::AttributeValue::N("7".to_string()))])
    )]
    #[case::lte(
        SortCondition::Le(json!("z")),
        "#a <= :a_lte0",
        collections::HashMap::from([(":a_lte0".to_string(), types::AttributeValue::S("z".to_string()))])
    )]
    #[case::between(
        SortCondition::Between(json!("b"), json!("c")),
        "#a BETWEEN :a_between0 AND :a_between1",
        collections::HashMap::from([
            (":a_between0".to_string(), types::AttributeValue::S("b".to_string())),
            (":a_between1".to_string(), types::AttributeValue::S("c".to_string())),
        ])
    )]
    fn test_condition_expression(
        #[case] condition: SortCondition,
        #[case] expected_expression: &str,
        #[case] expected_values: collections::HashMap<String, types::AttributeValue>,
    ) {
        let mut index = 0;
        let actual = condition_expression("a", &condition, &mut index).unwrap();
        assert_eq!(actual.expression, expected_expression);
        assert_eq!(
            actual.expression_attribute_names,
            collections::HashMap::from([("#a".to_string(), "a".to_string())])
        );
        assert_eq!(actual.expression_attribute_values, expected_values);
    }

    #[test]
    fn test_merge_joins_expressions() {
        let mut index = 0;
        let parts = vec![
            condition_expression("a", &SortCondition::Eq(json!("b")), &mut index).unwrap(),
            condition_expression("c", &SortCondition::Gt(json!("d")), &mut index).unwrap(),
        ];
        let merged = ExpressionInput::merge(" AND ", parts);
        assert_eq!(merged.expression, "#a = :a_eq0 AND #c > :c_gt1");
        assert_eq!(merged.expression_attribute_names.len(), 2);
        assert_eq!(merged.expression_attribute_values.len(), 2);
    }

    #[test]
    fn test_keys_to_item() {
        let keys = Keys {
            partition_key: crate::store::Key {
                name: "userId".to_string(),
                value: json!("u1"),
            },
            sort_key: Some(crate::store::Key {
                name: "id".to_string(),
                value: json!(42),
            }),
        };
        let item = keys_to_item(keys).unwrap();
        assert_eq!(
            item,
            collections::HashMap::from([
                (
                    "userId".to_string(),
                    types::AttributeValue::S("u1".to_string())
                ),
                ("id".to_string(), types::AttributeValue::N("42".to_string())),
            ])
        );
    }
}
