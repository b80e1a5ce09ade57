//! Integration tests for billing API DTOs
//!
//! These tests exercise the request/response conversions the handlers
//! rely on. For full integration testing against a live database, set
//! the DATABASE_URL environment variable and run the ignored suites in
//! voxbill-services.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use voxbill_api::dto::{
        AccountResponse, ChannelInfoResponse, InvoiceResponse, PaginationParams, PaymentResponse,
        WalletResponse,
    };
    use voxbill_core::models::{
        Account, AccountRole, ChannelInfo, Invoice, InvoiceLine, InvoiceStatus, Payment,
        PaymentMethod, Wallet,
    };

    #[test]
    fn test_pagination_offset_calculation() {
        let params = PaginationParams {
            page: 1,
            per_page: 10,
        };
        assert_eq!(params.offset(), 0);

        let params = PaginationParams {
            page: 3,
            per_page: 20,
        };
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
    }

    #[test]
    fn test_account_response_conversion() {
        let mut account = Account::default();
        account.id = 42;
        account.name = "Acme Telecom".to_string();
        account.role = AccountRole::Company;
        account.parent_id = Some(7);
        account.max_concurrent_calls = 30;
        account.active_calls = 4;

        let response = AccountResponse::from(account);

        assert_eq!(response.id, 42);
        assert_eq!(response.name, "Acme Telecom");
        assert_eq!(response.role, "company");
        assert_eq!(response.parent_id, Some(7));
        assert_eq!(response.max_concurrent_calls, 30);
        assert_eq!(response.active_calls, 4);
    }

    #[test]
    fn test_channel_info_response_conversion() {
        let info = ChannelInfo {
            holder_id: 10,
            holder_role: AccountRole::Company,
            max_channels: 8,
            active_channels: 2,
            available_channels: 6,
            utilization_percent: Decimal::new(25, 0),
            pooled: true,
        };

        let response = ChannelInfoResponse::from(info);

        assert_eq!(response.holder_id, 10);
        assert_eq!(response.holder_role, "company");
        assert_eq!(response.available_channels, 6);
        assert!(response.pooled);
    }

    #[test]
    fn test_wallet_response_conversion() {
        let mut wallet = Wallet::default();
        wallet.account_id = 5;
        wallet.balance = Decimal::new(12550, 2); // 125.50
        wallet.currency = "EUR".to_string();

        let response = WalletResponse::from(wallet);

        assert_eq!(response.account_id, 5);
        assert_eq!(response.balance, Decimal::new(12550, 2));
        assert_eq!(response.currency, "EUR");
    }

    #[test]
    fn test_payment_response_conversion() {
        let mut payment = Payment::default();
        payment.id = 900;
        payment.account_id = 5;
        payment.base_amount = Decimal::new(10000, 2);
        payment.tax_amount = Decimal::new(1900, 2);
        payment.total_amount = Decimal::new(11900, 2);
        payment.tax_type = "Standard".to_string();
        payment.method = PaymentMethod::Card;
        payment.invoice_number = "INV-2026-000042".to_string();

        let response = PaymentResponse::from(payment);

        assert_eq!(response.id, 900);
        assert_eq!(response.method, "card");
        assert_eq!(response.invoice_number, "INV-2026-000042");
        assert_eq!(response.total_amount, Decimal::new(11900, 2));
    }

    #[test]
    fn test_invoice_response_keeps_line_order() {
        let now = Utc::now();
        let invoice = Invoice {
            id: 77,
            account_id: 5,
            period_start: now - Duration::days(30),
            period_end: now,
            total: Decimal::new(1875, 3),
            status: InvoiceStatus::Unpaid,
            created_at: now,
            due_date: now + Duration::days(30),
            lines: vec![
                InvoiceLine {
                    id: 1,
                    invoice_id: 77,
                    description: "Spain".to_string(),
                    quantity_minutes: Decimal::new(5, 0),
                    unit_price: Decimal::new(15, 3),
                    total: Decimal::new(75, 3),
                },
                InvoiceLine {
                    id: 2,
                    invoice_id: 77,
                    description: "United Kingdom".to_string(),
                    quantity_minutes: Decimal::new(125, 1),
                    unit_price: Decimal::new(15, 2),
                    total: Decimal::new(1875, 3),
                },
            ],
        };

        let response = InvoiceResponse::from(invoice);

        assert_eq!(response.id, 77);
        assert_eq!(response.status, "unpaid");
        assert_eq!(response.lines.len(), 2);
        assert_eq!(response.lines[0].description, "Spain");
        assert_eq!(response.lines[1].description, "United Kingdom");
        assert_eq!(response.lines[1].unit_price, Decimal::new(15, 2));
    }
}
