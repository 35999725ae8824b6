use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tressa Order API",
        version = "0.3.0",
        description = r#"
# Tressa Order API

Order lifecycle and checkout settlement backend for the Tressa hair-care
storefront.

## Authentication

All order endpoints require a JWT bearer token:

```
Authorization: Bearer <your-jwt-token>
```

Buyers can create orders, read their own orders, and confirm UPI payment on
their own orders. Status transitions are admin-only.

## Idempotency

Send an `Idempotency-Key` header with `POST /orders` so a retried request
replays the original response instead of creating a second order.
        "#,
        contact(
            name = "Tressa Engineering",
            email = "eng@tressa.shop"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::report_payment,
    ),
    components(schemas(
        crate::handlers::orders::CartLineRequest,
        crate::handlers::orders::CreateOrderRequest,
        crate::handlers::orders::UpdateOrderStatusRequest,
        crate::handlers::orders::OrderItemResponse,
        crate::handlers::orders::OrderResponse,
        crate::handlers::orders::CreateOrderResponse,
        crate::entities::order::OrderStatus,
        crate::entities::order::PaymentMethod,
        crate::entities::order::PaymentStatus,
        crate::models::address::ShippingAddress,
        crate::services::payments::PaymentInstructions,
        crate::errors::ErrorResponse,
    )),
    tags(
        (name = "Orders", description = "Order lifecycle and checkout settlement")
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
