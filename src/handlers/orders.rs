use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    entities::{
        order::{Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus},
        order_item::Model as OrderItemModel,
    },
    errors::ServiceError,
    models::{Cart, CartItem, ShippingAddress},
    services::orders::CreateOrderInput,
    services::payments::PaymentInstructions,
    services::TransitionActor,
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

// Order DTOs

/// One cart line as submitted by the storefront client. Price and stock are
/// the client's add-time snapshots; both are re-checked server-side.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CartLineRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderRequest {
    #[serde(alias = "method")]
    pub payment_method: PaymentMethod,

    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<CartLineRequest>,

    pub shipping: ShippingAddress,

    /// Client-displayed total; the server recomputes and rejects a mismatch.
    #[serde(default, alias = "amount")]
    pub expected_total: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    #[serde(alias = "newStatus")]
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub total_amount: Decimal,
    pub currency: String,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: Option<ShippingAddress>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Creation response: the order plus, for UPI, the one-time payment payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInstructions>,
}

fn map_order(order: &OrderModel, items: &[OrderItemModel]) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_number: order.order_number.clone(),
        customer_id: order.customer_id,
        customer_name: order.customer_name.clone(),
        status: order.status.clone(),
        payment_method: order.payment_method.clone(),
        payment_status: order.payment_status.clone(),
        total_amount: order.total_amount,
        currency: order.currency.clone(),
        items: items
            .iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                name: item.name.clone(),
                image_url: item.image_url.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
            })
            .collect(),
        shipping_address: serde_json::from_str(&order.shipping_address).ok(),
        created_at: order.created_at,
        updated_at: order.updated_at,
    }
}

fn require_admin(auth_user: &AuthUser) -> Result<(), ServiceError> {
    if !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Admin role required".to_string(),
        ));
    }
    Ok(())
}

fn check_read_access(order: &OrderModel, auth_user: &AuthUser) -> Result<(), ServiceError> {
    if auth_user.is_admin() {
        return Ok(());
    }
    if order.customer_id == auth_user.customer_id()? {
        return Ok(());
    }
    Err(ServiceError::Forbidden(
        "Order belongs to a different customer".to_string(),
    ))
}

/// Create a new order from the submitted cart
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Converts the client cart into a durable order. UPI orders additionally return the one-time payment payload.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderResponse>),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse),
        (status = 401, description = "Not signed in", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreateOrderResponse>>), ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let customer_id = auth_user.customer_id()?;

    let cart = Cart::from_items(
        request
            .items
            .into_iter()
            .map(|line| CartItem {
                product_id: line.product_id,
                name: line.name,
                unit_price: line.unit_price,
                quantity: line.quantity,
                stock: line.stock,
                image_url: line.image_url,
            })
            .collect(),
    );

    let created = state
        .services
        .order
        .create_order(CreateOrderInput {
            customer_id,
            customer_name: auth_user.display_name(),
            customer_email: auth_user.email.clone(),
            cart,
            shipping_address: request.shipping,
            payment_method: request.payment_method,
            expected_total: request.expected_total,
        })
        .await?;

    // The UPI payload is handed out exactly once, with the creation response.
    let payment = match created.order.payment_method {
        PaymentMethod::Upi => Some(state.services.upi.payment_request(&created.order)?),
        PaymentMethod::Cod => None,
    };

    let response = CreateOrderResponse {
        order: map_order(&created.order, &created.items),
        payment,
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// List orders with pagination (admin console)
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Not signed in", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    require_admin(&auth_user)?;

    let status = query
        .status
        .as_deref()
        .map(|raw| {
            serde_json::from_value::<OrderStatus>(serde_json::Value::String(
                raw.trim().to_uppercase(),
            ))
            .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {raw}")))
        })
        .transpose()?;

    let (orders, total) = state
        .services
        .order
        .list_orders(query.page, query.limit, status)
        .await?;

    let items: Vec<OrderResponse> = orders.iter().map(|o| map_order(o, &[])).collect();
    let total_pages = total.div_ceil(query.limit.max(1));

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: query.page,
        limit: query.limit,
        total_pages,
    })))
}

/// Get order by ID
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Not signed in", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let (order, items) = state
        .services
        .order
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order with ID {} not found", id)))?;

    check_read_access(&order, &auth_user)?;

    Ok(Json(ApiResponse::success(map_order(&order, &items))))
}

/// Get order by its public order number
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    params(("order_number" = String, Path, description = "Public order number, e.g. ORD-AB12CD34")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let (order, items) = state
        .services
        .order
        .get_order_by_number(&order_number)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Order with number {} not found", order_number))
        })?;

    check_read_access(&order, &auth_user)?;

    Ok(Json(ApiResponse::success(map_order(&order, &items))))
}

/// Transition an order's status (admin action)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Not signed in", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Illegal transition", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    require_admin(&auth_user)?;

    let order = state
        .services
        .order_status
        .transition(id, request.status, TransitionActor::Admin)
        .await?;

    let items = state.services.order.get_order_items(order.id).await?;
    Ok(Json(ApiResponse::success(map_order(&order, &items))))
}

/// Buyer self-report: "I've paid" on a UPI order awaiting confirmation
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment-confirmation",
    summary = "Report UPI payment",
    description = "Marks the buyer's own order PAID after they complete the UPI transfer. Trust-based; the admin reconciles against the bank statement.",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Not signed in", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not your order, or order not awaiting payment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn report_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let customer_id = auth_user.customer_id()?;

    let order = state
        .services
        .order_status
        .transition(id, OrderStatus::Paid, TransitionActor::Buyer(customer_id))
        .await?;

    let items = state.services.order.get_order_items(order.id).await?;
    Ok(Json(ApiResponse::success(map_order(&order, &items))))
}
