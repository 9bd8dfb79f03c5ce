//! Reusable SQL fragments: literal quoting, lenient numeric extraction, and
//! the two-source service union every report reads from.

use crate::assets::symbol_case_sql;
use crate::chains::RELAY_ADDRESSES;
use crate::types::QueryParameters;

/// Status pair a transfer must have to count: executed on the source chain
/// and confirmed received on the destination.
pub const EXECUTED_STATUS: &str = "executed";
pub const RECEIVED_STATUS: &str = "received";

/// Separator between source and destination in a route label.
pub const ROUTE_SEPARATOR: &str = "➡";

/// Quote `s` as a warehouse string literal.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// A numeric value read out of a semi-structured column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericExpr {
    /// A single path, e.g. `data:send:amount`.
    Path(&'static str),
    /// The product of two paths, e.g. amount × unit price.
    Product(&'static str, &'static str),
}

impl NumericExpr {
    /// Expression yielding a double, or NULL when any input is an array, an
    /// object, or text that does not parse as a number.
    pub fn sql(&self) -> String {
        match self {
            Self::Path(p) => format!(
                "CASE WHEN IS_ARRAY({p}) OR IS_OBJECT({p}) THEN NULL ELSE TRY_TO_DOUBLE({p}::STRING) END"
            ),
            Self::Product(a, b) => format!(
                "CASE WHEN IS_ARRAY({a}) OR IS_OBJECT({a}) OR IS_ARRAY({b}) OR IS_OBJECT({b}) THEN NULL \
                 ELSE TRY_TO_DOUBLE({a}::STRING) * TRY_TO_DOUBLE({b}::STRING) END"
            ),
        }
    }
}

/// How one logical source maps onto the common service columns.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSource {
    pub service: &'static str,
    pub table: &'static str,
    /// Column matched against the relay address allow-list.
    pub relay_column: &'static str,
    pub source_chain: &'static str,
    pub destination_chain: &'static str,
    pub user: &'static str,
    pub amount: NumericExpr,
    pub amount_usd: NumericExpr,
    /// Candidates for the fee, first non-null wins.
    pub fee: &'static [NumericExpr],
    pub raw_asset: &'static str,
}

pub const TOKEN_TRANSFERS: ServiceSource = ServiceSource {
    service: "Token Transfers",
    table: "axelar.axelscan.fact_transfers",
    relay_column: "sender_address",
    source_chain: "data:send:original_source_chain::STRING",
    destination_chain: "data:send:original_destination_chain::STRING",
    user: "recipient_address",
    amount: NumericExpr::Path("data:send:amount"),
    amount_usd: NumericExpr::Product("data:send:amount", "data:link:price"),
    fee: &[NumericExpr::Path("data:send:fee_value")],
    raw_asset: "data:link:asset::STRING",
};

pub const GENERIC_MESSAGES: ServiceSource = ServiceSource {
    service: "GMP",
    table: "axelar.axelscan.fact_gmp",
    relay_column: "data:approved:returnValues:contractAddress",
    source_chain: "data:call.chain::STRING",
    destination_chain: "data:call.returnValues.destinationChain::STRING",
    user: "data:call.transaction.from::STRING",
    amount: NumericExpr::Path("data:amount"),
    amount_usd: NumericExpr::Path("data:value"),
    fee: &[
        NumericExpr::Product(
            "data:gas:gas_used_amount",
            "data:gas_price_rate:source_token.token_price.usd",
        ),
        NumericExpr::Path("data:fees:express_fee_usd"),
    ],
    raw_asset: "data:symbol::STRING",
};

pub const SERVICE_SOURCES: [ServiceSource; 2] = [TOKEN_TRANSFERS, GENERIC_MESSAGES];

/// `(column ILIKE '%addr%' OR ...)` over the relay allow-list.
pub fn relay_filter(column: &str) -> String {
    let clauses: Vec<String> = RELAY_ADDRESSES
        .iter()
        .map(|r| format!("{column} ILIKE {}", quote_literal(&format!("%{}%", r.address))))
        .collect();
    format!("({})", clauses.join("\n        OR "))
}

impl ServiceSource {
    fn select_sql(&self) -> String {
        let fee = match self.fee {
            [single] => single.sql(),
            many => format!(
                "COALESCE({})",
                many.iter()
                    .map(NumericExpr::sql)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        format!(
            "    SELECT\n      created_at,\n      LOWER({src}) AS source_chain,\n      \
             LOWER({dst}) AS destination_chain,\n      {user} AS user_address,\n      \
             {amount} AS amount,\n      {amount_usd} AS amount_usd,\n      {fee} AS fee,\n      \
             id,\n      {service} AS service,\n      {asset} AS raw_asset\n    \
             FROM {table}\n    WHERE status = {executed}\n      AND simplified_status = {received}\n      \
             AND {relay}",
            src = self.source_chain,
            dst = self.destination_chain,
            user = self.user,
            amount = self.amount.sql(),
            amount_usd = self.amount_usd.sql(),
            service = quote_literal(self.service),
            asset = self.raw_asset,
            table = self.table,
            executed = quote_literal(EXECUTED_STATUS),
            received = quote_literal(RECEIVED_STATUS),
            relay = relay_filter(self.relay_column),
        )
    }
}

/// `WITH axelar_service AS (...), overview AS (...)`.
///
/// `axelar_service` is the union of all sources restricted to the relay
/// allow-list and the executed/received status pair. `overview` adds the
/// display symbol and route label. Neither applies the date range.
pub fn service_ctes() -> String {
    let union = SERVICE_SOURCES
        .iter()
        .map(ServiceSource::select_sql)
        .collect::<Vec<_>>()
        .join("\n    UNION ALL\n");
    format!(
        "WITH axelar_service AS (\n{union}\n),\noverview AS (\n    SELECT\n      *,\n      \
         {symbol} AS symbol,\n      source_chain || {sep} || destination_chain AS route\n    \
         FROM axelar_service\n)",
        symbol = symbol_case_sql("raw_asset"),
        sep = quote_literal(ROUTE_SEPARATOR),
    )
}

/// Inclusive date range over `column` (a date expression).
pub fn date_range(column: &str, params: &QueryParameters) -> String {
    format!(
        "{column} >= {} AND {column} <= {}",
        quote_literal(&params.start().format("%Y-%m-%d").to_string()),
        quote_literal(&params.end().format("%Y-%m-%d").to_string()),
    )
}

/// `DATE_TRUNC` of `column` at the parameters' granularity.
pub fn time_bucket(column: &str, params: &QueryParameters) -> String {
    format!(
        "DATE_TRUNC({}, {column})",
        quote_literal(params.granularity().as_str())
    )
}
