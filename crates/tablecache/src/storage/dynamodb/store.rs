//! DynamoDB table store.
//!
//! Implements [`TableStore`] from `tablecache_core::storage` using DynamoDB.

use std::env;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::types::ReturnValue;
use aws_sdk_dynamodb::Client;

use tablecache_core::storage::{
    Condition, GetItemInput, Item, ItemsPage, QueryInput, Result, ScanInput, TableStore,
    UpdateRequest,
};

use super::conversions::{
    attributes_to_item, item_to_attributes, optional_key, optional_names, optional_values,
    page_from_output,
};
use super::error::{
    map_delete_item_error, map_get_item_error, map_put_item_error, map_query_error,
    map_scan_error, map_update_item_error,
};

/// Connection parameters used when no pre-built client is supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynamoDbParams {
    /// AWS region; the SDK default chain applies when unset.
    pub region: Option<String>,
    /// Endpoint override, e.g. `http://localhost:8000` for DynamoDB Local.
    pub endpoint_url: Option<String>,
}

impl DynamoDbParams {
    /// Reads `AWS_REGION` and `DYNAMODB_ENDPOINT_URL`.
    pub fn from_env() -> Self {
        Self {
            region: env::var("AWS_REGION").ok(),
            endpoint_url: env::var("DYNAMODB_ENDPOINT_URL").ok(),
        }
    }
}

/// Either a ready client or the parameters to build one, never both.
#[derive(Debug, Clone)]
pub enum DynamoDbConnection {
    Client(Client),
    Params(DynamoDbParams),
}

/// DynamoDB-backed [`TableStore`].
///
/// Table names are supplied per call, so one store serves every table.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a store around an existing DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a store from a client or from connection parameters.
    pub async fn connect(connection: DynamoDbConnection) -> Self {
        match connection {
            DynamoDbConnection::Client(client) => Self::new(client),
            DynamoDbConnection::Params(params) => {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
                if let Some(region) = params.region {
                    loader = loader.region(Region::new(region));
                }
                if let Some(endpoint_url) = params.endpoint_url {
                    loader = loader.endpoint_url(endpoint_url);
                }
                let config = loader.load().await;
                Self::new(Client::new(&config))
            }
        }
    }

    /// Creates a store using the AWS SDK default credential chain and
    /// [`DynamoDbParams::from_env`].
    pub async fn from_env() -> Self {
        Self::connect(DynamoDbConnection::Params(DynamoDbParams::from_env())).await
    }

    /// The underlying SDK client.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn get(&self, table_name: &str, input: &GetItemInput) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .set_key(Some(item_to_attributes(&input.key)?))
            .consistent_read(input.consistent_read)
            .set_projection_expression(input.projection_expression.clone())
            .set_expression_attribute_names(optional_names(&input.expression_attribute_names))
            .send()
            .await
            .map_err(|e| map_get_item_error(e, table_name))?;

        output.item.map(attributes_to_item).transpose()
    }

    async fn query(&self, table_name: &str, input: &QueryInput) -> Result<ItemsPage> {
        let output = self
            .client
            .query()
            .table_name(table_name)
            .key_condition_expression(&input.key_condition_expression)
            .set_index_name(input.index_name.clone())
            .set_filter_expression(input.filter_expression.clone())
            .set_expression_attribute_names(optional_names(&input.expression_attribute_names))
            .set_expression_attribute_values(optional_values(&input.expression_attribute_values)?)
            .consistent_read(input.consistent_read)
            .set_limit(input.limit)
            .set_exclusive_start_key(optional_key(input.exclusive_start_key.as_ref())?)
            .scan_index_forward(input.scan_index_forward)
            .send()
            .await
            .map_err(|e| map_query_error(e, table_name))?;

        page_from_output(
            output.items,
            output.count,
            output.scanned_count,
            output.last_evaluated_key,
        )
    }

    async fn scan(&self, table_name: &str, input: &ScanInput) -> Result<ItemsPage> {
        let output = self
            .client
            .scan()
            .table_name(table_name)
            .set_index_name(input.index_name.clone())
            .set_filter_expression(input.filter_expression.clone())
            .set_expression_attribute_names(optional_names(&input.expression_attribute_names))
            .set_expression_attribute_values(optional_values(&input.expression_attribute_values)?)
            .consistent_read(input.consistent_read)
            .set_limit(input.limit)
            .set_exclusive_start_key(optional_key(input.exclusive_start_key.as_ref())?)
            .send()
            .await
            .map_err(|e| map_scan_error(e, table_name))?;

        page_from_output(
            output.items,
            output.count,
            output.scanned_count,
            output.last_evaluated_key,
        )
    }

    async fn put(
        &self,
        table_name: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item_to_attributes(&item)?));

        if let Some(condition) = condition {
            request = request
                .condition_expression(&condition.expression)
                .set_expression_attribute_names(optional_names(
                    &condition.expression_attribute_names,
                ))
                .set_expression_attribute_values(optional_values(
                    &condition.expression_attribute_values,
                )?);
        }

        request
            .send()
            .await
            .map_err(|e| map_put_item_error(e, table_name))?;

        Ok(())
    }

    async fn update(&self, table_name: &str, request: &UpdateRequest) -> Result<Option<Item>> {
        let output = self
            .client
            .update_item()
            .table_name(table_name)
            .set_key(Some(item_to_attributes(&request.key)?))
            .update_expression(&request.update_expression)
            .set_condition_expression(request.condition_expression.clone())
            .set_expression_attribute_names(optional_names(&request.expression_attribute_names))
            .set_expression_attribute_values(optional_values(
                &request.expression_attribute_values,
            )?)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|e| map_update_item_error(e, table_name))?;

        output.attributes.map(attributes_to_item).transpose()
    }

    async fn delete(&self, table_name: &str, key: &Item) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table_name)
            .set_key(Some(item_to_attributes(key)?))
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, table_name))?;

        Ok(())
    }
}
