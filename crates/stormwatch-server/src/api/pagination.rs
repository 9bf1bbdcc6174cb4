use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 500;

/// 列表接口的分页参数。
///
/// Values arrive as raw query-string text and are parsed leniently:
/// anything that is not a non-negative integer falls back to the
/// default instead of failing the whole request, and `limit` is
/// clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 每页条数（1-500，默认 20）
    #[param(required = false, value_type = u64)]
    pub limit: Option<String>,
    /// 偏移量（默认 0）
    #[param(required = false, value_type = u64)]
    pub offset: Option<String>,
}

fn parse_or(raw: Option<&str>, fallback: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(fallback)
}

impl PageQuery {
    pub fn limit(&self) -> usize {
        parse_or(self.limit.as_deref(), DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        parse_or(self.offset.as_deref(), 0)
    }
}
