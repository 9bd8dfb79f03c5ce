//! Static bucket boundaries for size/count distributions.
//!
//! Each set is an ordered list of upper bounds. A value `x` lands in the first
//! bucket with `x <= upper`, which, given the ordering, is the bucket with
//! `previous_upper < x <= upper`. The last bucket is open-ended. Missing (and
//! NaN) inputs land in no bucket.

/// One labeled bin. `upper = None` marks the open-ended last bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub upper: Option<f64>,
    pub label: &'static str,
}

/// An ordered, exhaustive set of bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketSet {
    pub name: &'static str,
    pub buckets: &'static [Bucket],
}

/// Total USD volume per route.
pub const ROUTE_VOLUME: BucketSet = BucketSet {
    name: "Bridge Size",
    buckets: &[
        Bucket {
            upper: Some(10.0),
            label: "<=$10",
        },
        Bucket {
            upper: Some(100.0),
            label: "$10-$100",
        },
        Bucket {
            upper: Some(1_000.0),
            label: "$100-$1K",
        },
        Bucket {
            upper: Some(10_000.0),
            label: "$1K-$10K",
        },
        Bucket {
            upper: Some(100_000.0),
            label: "$10K-$100K",
        },
        Bucket {
            upper: Some(1_000_000.0),
            label: "$100K-$1M",
        },
        Bucket {
            upper: None,
            label: ">$1M",
        },
    ],
};

/// Number of transfers per route.
pub const ROUTE_COUNT: BucketSet = BucketSet {
    name: "Bridge Count",
    buckets: &[
        Bucket {
            upper: Some(10.0),
            label: "<=10 Txns",
        },
        Bucket {
            upper: Some(100.0),
            label: "11-100 Txns",
        },
        Bucket {
            upper: Some(1_000.0),
            label: "101-1000 Txns",
        },
        Bucket {
            upper: Some(10_000.0),
            label: "1001-10000 Txns",
        },
        Bucket {
            upper: None,
            label: ">10000 Txns",
        },
    ],
};

/// USD value of a single transfer.
pub const TRANSFER_SIZE: BucketSet = BucketSet {
    name: "Bridge Size",
    buckets: &[
        Bucket {
            upper: Some(10.0),
            label: "<=$10",
        },
        Bucket {
            upper: Some(100.0),
            label: "$10-$100",
        },
        Bucket {
            upper: Some(1_000.0),
            label: "$100-$1K",
        },
        Bucket {
            upper: Some(10_000.0),
            label: "$1K-$10K",
        },
        Bucket {
            upper: Some(100_000.0),
            label: "$10K-$100K",
        },
        Bucket {
            upper: None,
            label: ">$100K",
        },
    ],
};

impl BucketSet {
    /// Label of the bin holding `value`, or `None` for a missing value.
    pub fn classify(&self, value: Option<f64>) -> Option<&'static str> {
        let x = value.filter(|v| !v.is_nan())?;
        self.buckets
            .iter()
            .find(|b| b.upper.is_none_or(|upper| x <= upper))
            .map(|b| b.label)
    }

    /// Labels in boundary order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.buckets.iter().map(|b| b.label).collect()
    }

    /// `CASE` expression classifying `expr` the same way [`Self::classify`] does.
    ///
    /// Unmatched input (a NULL `expr`) falls through to NULL.
    pub fn case_sql(&self, expr: &str) -> String {
        let mut sql = String::from("CASE");
        let mut lower: Option<f64> = None;
        for bucket in self.buckets {
            let cond = match (lower, bucket.upper) {
                (None, Some(hi)) => format!("{expr} <= {hi}"),
                (Some(lo), Some(hi)) => format!("{expr} > {lo} AND {expr} <= {hi}"),
                (Some(lo), None) => format!("{expr} > {lo}"),
                (None, None) => format!("{expr} IS NOT NULL"),
            };
            sql.push_str(&format!("\n      WHEN {cond} THEN '{}'", bucket.label));
            lower = bucket.upper;
        }
        sql.push_str("\n    END");
        sql
    }

    /// `CASE` expression mapping a label back to its 1-based position, for ordering.
    pub fn order_sql(&self, label_expr: &str) -> String {
        let mut sql = String::from("CASE");
        for (i, bucket) in self.buckets.iter().enumerate() {
            sql.push_str(&format!(
                "\n      WHEN {label_expr} = '{}' THEN {}",
                bucket.label,
                i + 1
            ));
        }
        sql.push_str("\n    END");
        sql
    }
}
