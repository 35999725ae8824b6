use qrcode::render::svg;
use qrcode::QrCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    entities::order::{Model as OrderModel, PaymentMethod},
    errors::ServiceError,
};

/// What the buyer needs to settle a UPI order: the deep-link and a QR
/// rendering of the same payload. Shown exactly once, in the order-creation
/// response.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentInstructions {
    pub payee_vpa: String,
    pub payee_name: String,
    pub amount: String,
    pub currency: String,
    /// `upi://pay` deep-link for tap-to-pay.
    pub uri: String,
    /// SVG rendering of the same link for scanning.
    pub qr_svg: String,
}

/// Builds deterministic UPI collect payloads for a fixed payee.
///
/// There is no payment gateway behind this: the buyer pays out-of-band and
/// self-reports, and the admin reconciles against the bank statement. The
/// payload is the whole integration.
#[derive(Clone)]
pub struct UpiService {
    payee_vpa: String,
    payee_name: String,
}

impl UpiService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            payee_vpa: config.upi_payee_vpa.clone(),
            payee_name: config.upi_payee_name.clone(),
        }
    }

    pub fn from_payee(payee_vpa: String, payee_name: String) -> Self {
        Self {
            payee_vpa,
            payee_name,
        }
    }

    /// Builds payment instructions for a UPI order.
    pub fn payment_request(
        &self,
        order: &OrderModel,
    ) -> Result<PaymentInstructions, ServiceError> {
        if order.payment_method != PaymentMethod::Upi {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is not a UPI order",
                order.order_number
            )));
        }

        self.build(order.total_amount, &order.currency)
    }

    fn build(&self, amount: Decimal, currency: &str) -> Result<PaymentInstructions, ServiceError> {
        let amount = format!("{:.2}", amount);

        let uri = Url::parse_with_params(
            "upi://pay",
            &[
                ("pa", self.payee_vpa.as_str()),
                ("pn", self.payee_name.as_str()),
                ("am", amount.as_str()),
                ("cu", currency),
            ],
        )
        .map_err(|e| ServiceError::InternalError(format!("UPI URI construction: {}", e)))?
        .to_string();

        let code = QrCode::new(uri.as_bytes())
            .map_err(|e| ServiceError::InternalError(format!("QR encoding: {}", e)))?;
        let qr_svg = code
            .render::<svg::Color>()
            .min_dimensions(240, 240)
            .build();

        Ok(PaymentInstructions {
            payee_vpa: self.payee_vpa.clone(),
            payee_name: self.payee_name.clone(),
            amount,
            currency: currency.to_string(),
            uri,
            qr_svg,
        })
    }
}
