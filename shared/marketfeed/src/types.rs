use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const KLINE_TYPE: &str = "KLINE";
pub const TRADE_TYPE: &str = "TRADE";

/// Outbound control frames, tagged the way the upstream expects them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedCommand {
    #[serde(rename = "SUBSCRIBE")]
    Subscribe { base_mint: String },
    #[serde(rename = "UNSUBSCRIBE")]
    Unsubscribe { base_mint: String },
}

impl FeedCommand {
    pub fn subscribe(topic: &str) -> Self {
        Self::Subscribe {
            base_mint: topic.to_string(),
        }
    }

    pub fn unsubscribe(topic: &str) -> Self {
        Self::Unsubscribe {
            base_mint: topic.to_string(),
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::Subscribe { base_mint } | Self::Unsubscribe { base_mint } => base_mint,
        }
    }
}

/// Wire shape of a KLINE payload. Every numeric field arrives as a decimal
/// string and must be parsed before arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKline {
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub quote_volume: String,
    pub start_time: String,
    pub end_time: String,
    pub trade_count: String,
}

/// Wire shape of a TRADE payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrade {
    pub trader_address: String,
    pub time: String,
    pub pool_address: String,
    pub amount_in: String,
    pub amount_out: String,
    pub base_mint: String,
    pub quote_mint: String,
    #[serde(rename = "type")]
    pub side: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A KLINE frame with its numerics parsed. The `low <= open,close <= high`
/// invariant is not checked here; frames are forwarded as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedKline {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub trade_count: u64,
}

impl NormalizedKline {
    fn from_raw(raw: &RawKline) -> Option<Self> {
        Some(Self {
            open: raw.open.parse().ok()?,
            high: raw.high.parse().ok()?,
            low: raw.low.parse().ok()?,
            close: raw.close.parse().ok()?,
            volume: raw.volume.parse().ok()?,
            quote_volume: raw.quote_volume.parse().ok()?,
            start_time: raw.start_time.parse().ok()?,
            end_time: raw.end_time.parse().ok()?,
            trade_count: raw.trade_count.parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedTrade {
    pub trader_address: String,
    pub time: i64,
    pub pool_address: String,
    pub amount_in: f64,
    pub amount_out: f64,
    pub base_mint: String,
    pub quote_mint: String,
    pub side: TradeSide,
}

impl NormalizedTrade {
    fn from_raw(raw: RawTrade) -> Option<Self> {
        let side = match raw.side.as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            _ => return None,
        };
        Some(Self {
            trader_address: raw.trader_address,
            time: raw.time.parse().ok()?,
            pool_address: raw.pool_address,
            amount_in: raw.amount_in.parse().ok()?,
            amount_out: raw.amount_out.parse().ok()?,
            base_mint: raw.base_mint,
            quote_mint: raw.quote_mint,
            side,
        })
    }
}

/// What consumers receive. KLINE and TRADE frames are normalized; every
/// other frame type is passed through verbatim.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Kline(NormalizedKline),
    Trade(NormalizedTrade),
    Raw { message_type: String, payload: Value },
}

impl FeedEvent {
    /// Parses one inbound text frame. Returns None for anything malformed:
    /// unparseable JSON, a missing `type`, or a recognized type whose
    /// payload does not normalize.
    pub fn from_wire(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let message_type = value.get("type")?.as_str()?.to_string();
        match message_type.as_str() {
            KLINE_TYPE => {
                let raw: RawKline = serde_json::from_value(value.get("data")?.clone()).ok()?;
                Some(Self::Kline(NormalizedKline::from_raw(&raw)?))
            }
            TRADE_TYPE => {
                let raw: RawTrade = serde_json::from_value(value.get("data")?.clone()).ok()?;
                Some(Self::Trade(NormalizedTrade::from_raw(raw)?))
            }
            _ => Some(Self::Raw {
                message_type,
                payload: value,
            }),
        }
    }

    pub fn message_type(&self) -> &str {
        match self {
            Self::Kline(_) => KLINE_TYPE,
            Self::Trade(_) => TRADE_TYPE,
            Self::Raw { message_type, .. } => message_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_command_wire_shape() {
        let json = serde_json::to_value(FeedCommand::subscribe("MintA")).unwrap();
        assert_eq!(json["type"], "SUBSCRIBE");
        assert_eq!(json["base_mint"], "MintA");

        let json = serde_json::to_value(FeedCommand::unsubscribe("MintA")).unwrap();
        assert_eq!(json["type"], "UNSUBSCRIBE");
        assert_eq!(FeedCommand::unsubscribe("MintA").topic(), "MintA");
    }

    #[test]
    fn test_kline_normalization_parses_decimal_strings() {
        let frame = r#"{
            "type": "KLINE",
            "data": {
                "open": "1.25", "high": "2.5", "low": "1.0", "close": "2.0",
                "volume": "1000", "quoteVolume": "1800.5",
                "startTime": "1700000000", "endTime": "1700000060",
                "tradeCount": "42"
            }
        }"#;

        match FeedEvent::from_wire(frame) {
            Some(FeedEvent::Kline(kline)) => {
                assert_eq!(kline.open, 1.25);
                assert_eq!(kline.quote_volume, 1800.5);
                assert_eq!(kline.end_time, 1_700_000_060);
                assert_eq!(kline.trade_count, 42);
            }
            other => panic!("expected kline, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_kline_bounds_are_not_rejected() {
        // low > high is nonsense but normalization forwards it untouched
        let frame = r#"{
            "type": "KLINE",
            "data": {
                "open": "1.0", "high": "0.5", "low": "3.0", "close": "1.0",
                "volume": "0", "quoteVolume": "0",
                "startTime": "0", "endTime": "0", "tradeCount": "0"
            }
        }"#;

        assert!(matches!(
            FeedEvent::from_wire(frame),
            Some(FeedEvent::Kline(_))
        ));
    }

    #[test]
    fn test_trade_normalization() {
        let frame = r#"{
            "type": "TRADE",
            "data": {
                "traderAddress": "Trader111",
                "time": "1700000123",
                "poolAddress": "Pool111",
                "amountIn": "1.5",
                "amountOut": "300",
                "baseMint": "MintA",
                "quoteMint": "So11111111111111111111111111111111111111112",
                "type": "buy"
            }
        }"#;

        match FeedEvent::from_wire(frame) {
            Some(FeedEvent::Trade(trade)) => {
                assert_eq!(trade.side, TradeSide::Buy);
                assert_eq!(trade.amount_in, 1.5);
                assert_eq!(trade.amount_out, 300.0);
                assert_eq!(trade.time, 1_700_000_123);
            }
            other => panic!("expected trade, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_passes_through_raw() {
        let frame = r#"{"type": "LAUNCHPAD", "data": {"mint": "MintB"}}"#;
        match FeedEvent::from_wire(frame) {
            Some(FeedEvent::Raw {
                message_type,
                payload,
            }) => {
                assert_eq!(message_type, "LAUNCHPAD");
                assert_eq!(payload["data"]["mint"], "MintB");
            }
            other => panic!("expected raw passthrough, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        assert!(FeedEvent::from_wire("not json").is_none());
        assert!(FeedEvent::from_wire(r#"{"data": 1}"#).is_none());
        assert!(FeedEvent::from_wire(r#"{"type": 7}"#).is_none());
        // recognized type with an unparseable numeric field
        let frame = r#"{
            "type": "TRADE",
            "data": {
                "traderAddress": "t", "time": "soon", "poolAddress": "p",
                "amountIn": "1", "amountOut": "2",
                "baseMint": "m", "quoteMint": "q", "type": "buy"
            }
        }"#;
        assert!(FeedEvent::from_wire(frame).is_none());
    }
}
