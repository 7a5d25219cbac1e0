// server/src/db/orders.rs

use super::{corrupt_row, store_error, PgStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kilnworks_core::ports::{OrderQuery, PaymentClaim};
use kilnworks_core::{
  CustomerSnapshot, FulfillmentStatus, GatewayCapture, LineItem, Money, Order, OrderLedger, Payment, PaymentStatus,
  SettlementState, StoreError,
};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

const ORDER_COLUMNS: &str = "id, order_number, customer, items, shipping_method, total_minor, currency, \
  fulfillment_status, payment_mode, gateway_order_id, gateway_payment_id, gateway_signature, payment_status, \
  settlement, settled_at, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
  id: Uuid,
  order_number: String,
  customer: Json<CustomerSnapshot>,
  items: Json<Vec<LineItem>>,
  shipping_method: String,
  total_minor: i64,
  currency: String,
  fulfillment_status: String,
  payment_mode: String,
  gateway_order_id: Option<String>,
  gateway_payment_id: Option<String>,
  gateway_signature: Option<String>,
  payment_status: String,
  settlement: String,
  settled_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = StoreError;

  fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
    let payment = match (row.payment_mode.as_str(), row.gateway_order_id) {
      ("COD", _) => Payment::CashOnDelivery,
      ("GATEWAY", Some(gateway_order_id)) => Payment::Gateway {
        gateway_order_id,
        capture: row
          .gateway_payment_id
          .zip(row.gateway_signature)
          .map(|(payment_id, signature)| GatewayCapture { payment_id, signature }),
      },
      (mode, _) => return Err(corrupt_row(format!("order {} has payment mode '{}'", row.id, mode))),
    };

    Ok(Order {
      id: row.id,
      order_number: row.order_number.into(),
      customer: row.customer.0,
      items: row.items.0,
      shipping_method: row.shipping_method,
      total: Money::from_minor(row.total_minor),
      currency: row.currency,
      fulfillment_status: row.fulfillment_status.parse().map_err(corrupt_row)?,
      payment,
      payment_status: row.payment_status.parse().map_err(corrupt_row)?,
      settlement: row.settlement.parse().map_err(corrupt_row)?,
      settled_at: row.settled_at,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

fn into_order(row: Option<OrderRow>) -> Result<Option<Order>, StoreError> {
  row.map(Order::try_from).transpose()
}

impl PgStore {
  async fn fetch_one_where(&self, condition: &str, value: &str) -> Result<Option<Order>, StoreError> {
    let sql = format!("SELECT {} FROM orders WHERE {} = $1", ORDER_COLUMNS, condition);
    let row: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(value)
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    into_order(row)
  }
}

#[async_trait]
impl OrderLedger for PgStore {
  #[instrument(name = "PgStore::insert", skip(self, order), fields(order_number = %order.order_number), err(Display))]
  async fn insert(&self, order: &Order) -> Result<(), StoreError> {
    let capture = order.payment.capture();
    sqlx::query(
      "INSERT INTO orders (id, order_number, customer, items, shipping_method, total_minor, currency, \
       fulfillment_status, payment_mode, gateway_order_id, gateway_payment_id, gateway_signature, payment_status, \
       settlement, settled_at, created_at, updated_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(order.id)
    .bind(order.order_number.as_str())
    .bind(Json(&order.customer))
    .bind(Json(&order.items))
    .bind(&order.shipping_method)
    .bind(order.total.minor())
    .bind(&order.currency)
    .bind(order.fulfillment_status.as_str())
    .bind(order.payment_mode().as_str())
    .bind(order.payment.gateway_order_id())
    .bind(capture.map(|c| c.payment_id.as_str()))
    .bind(capture.map(|c| c.signature.as_str()))
    .bind(order.payment_status.as_str())
    .bind(order.settlement.as_str())
    .bind(order.settled_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(self.pool())
    .await
    .map_err(store_error)?;
    debug!("Order row inserted.");
    Ok(())
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
    let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
    let row: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(id)
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    into_order(row)
  }

  async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
    self.fetch_one_where("order_number", order_number).await
  }

  async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Order>, StoreError> {
    self.fetch_one_where("gateway_order_id", gateway_order_id).await
  }

  #[instrument(name = "PgStore::claim_payment", skip(self, capture), err(Display))]
  async fn claim_payment(&self, gateway_order_id: &str, capture: &GatewayCapture) -> Result<PaymentClaim, StoreError> {
    let sql = format!(
      "UPDATE orders SET payment_status = 'paid', \
       fulfillment_status = CASE WHEN fulfillment_status = 'pending' THEN 'confirmed' ELSE fulfillment_status END, \
       gateway_payment_id = $2, gateway_signature = $3, \
       settlement = CASE WHEN settlement = 'not_due' AND fulfillment_status NOT IN ('cancelled', 'failed') \
       THEN 'due' ELSE settlement END, updated_at = NOW() \
       WHERE gateway_order_id = $1 AND payment_status = 'pending' \
       RETURNING {}",
      ORDER_COLUMNS
    );
    let claimed: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(gateway_order_id)
      .bind(&capture.payment_id)
      .bind(&capture.signature)
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    if let Some(order) = into_order(claimed)? {
      return Ok(PaymentClaim::Claimed(order));
    }

    // SET expressions read the pre-update row, so a cancelled order stays cancelled and owes no stock.
    // The conditional update matched nothing: find out why.
    Ok(match self.find_by_gateway_order_id(gateway_order_id).await? {
      None => PaymentClaim::Missing,
      Some(order) if order.payment_status == PaymentStatus::Paid => PaymentClaim::AlreadyPaid(order),
      Some(order) => PaymentClaim::NotPending(order),
    })
  }

  async fn set_fulfillment_status(
    &self,
    id: Uuid,
    expected: Option<FulfillmentStatus>,
    status: FulfillmentStatus,
  ) -> Result<Option<Order>, StoreError> {
    let sql = format!(
      "UPDATE orders SET fulfillment_status = $2, updated_at = NOW() \
       WHERE id = $1 AND ($3::TEXT IS NULL OR fulfillment_status = $3) RETURNING {}",
      ORDER_COLUMNS
    );
    let row: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(id)
      .bind(status.as_str())
      .bind(expected.map(FulfillmentStatus::as_str))
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    into_order(row)
  }

  async fn set_payment_status(
    &self,
    id: Uuid,
    expected: Option<PaymentStatus>,
    status: PaymentStatus,
  ) -> Result<Option<Order>, StoreError> {
    let sql = format!(
      "UPDATE orders SET payment_status = $2, updated_at = NOW() \
       WHERE id = $1 AND ($3::TEXT IS NULL OR payment_status = $3) RETURNING {}",
      ORDER_COLUMNS
    );
    let row: Option<OrderRow> = sqlx::query_as(&sql)
      .bind(id)
      .bind(status.as_str())
      .bind(expected.map(PaymentStatus::as_str))
      .fetch_optional(self.pool())
      .await
      .map_err(store_error)?;
    into_order(row)
  }

  #[instrument(name = "PgStore::transition_settlement", skip(self), err(Display))]
  async fn transition_settlement(
    &self,
    id: Uuid,
    from: SettlementState,
    to: SettlementState,
  ) -> Result<bool, StoreError> {
    let result = sqlx::query(
      "UPDATE orders SET settlement = $3, \
       settled_at = CASE WHEN $3 = 'settled' THEN NOW() ELSE settled_at END, updated_at = NOW() \
       WHERE id = $1 AND settlement = $2",
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .execute(self.pool())
    .await
    .map_err(store_error)?;
    Ok(result.rows_affected() == 1)
  }

  async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError> {
    let mut builder: QueryBuilder<Postgres> =
      QueryBuilder::new(format!("SELECT {} FROM orders WHERE TRUE", ORDER_COLUMNS));
    if let Some(from) = query.created_from {
      builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(after) = query.created_after {
      builder.push(" AND created_at > ").push_bind(after);
    }
    if let Some(state) = query.settlement {
      builder.push(" AND settlement = ").push_bind(state.as_str());
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = query.limit {
      builder.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }

    let rows: Vec<OrderRow> = builder
      .build_query_as()
      .fetch_all(self.pool())
      .await
      .map_err(store_error)?;
    rows.into_iter().map(Order::try_from).collect()
  }

  #[instrument(name = "PgStore::expire_pending_gateway_orders", skip(self), err(Display))]
  async fn expire_pending_gateway_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
    let sql = format!(
      "UPDATE orders SET payment_status = 'failed', fulfillment_status = 'failed', updated_at = NOW() \
       WHERE payment_mode = 'GATEWAY' AND payment_status = 'pending' AND created_at < $1 \
       RETURNING {}",
      ORDER_COLUMNS
    );
    let rows: Vec<OrderRow> = sqlx::query_as(&sql)
      .bind(cutoff)
      .fetch_all(self.pool())
      .await
      .map_err(store_error)?;
    rows.into_iter().map(Order::try_from).collect()
  }
}
