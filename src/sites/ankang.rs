//! Ankang municipal government portal (<https://www.ankang.gov.cn>).
//!
//! Section listings live at `/Node-{id}.html`; each entry is an `.list-li`
//! element holding a link, a `.list-title`, a `.list-time` date such as
//! `2025-03-20` and an optional `.list-desc` summary.

use once_cell::sync::Lazy;

use super::{ChannelDefaults, ItemDefaults, SelectorMap, SiteAdapter};
use crate::models::{Enclosure, SourceRef};

pub const ORIGIN: &str = "https://www.ankang.gov.cn";

static ADAPTER: Lazy<SiteAdapter> = Lazy::new(|| SiteAdapter {
    name: "ankang-gov".to_string(),
    route: "/ankang/gov".to_string(),
    origin: ORIGIN.to_string(),
    target_path: "/Node-{node_id}.html".to_string(),
    accept_language: "zh-CN,zh;q=0.9".to_string(),
    utc_offset_hours: 8,
    failure_message: "安康政府页面请求失败".to_string(),
    selectors: SelectorMap::default(),
    channel: ChannelDefaults {
        title: "安康市政府专栏".to_string(),
        description: "安康市政府官网政务信息订阅源".to_string(),
        language: "zh-cn".to_string(),
        category: "ankang-gov".to_string(),
    },
    item: ItemDefaults {
        author: "安康市政府".to_string(),
        category: "政务信息".to_string(),
        untitled: "无标题".to_string(),
        title_from_link_text: false,
        empty_title: "暂无政务信息".to_string(),
        empty_description: "该栏目暂无公开的政务信息".to_string(),
        enclosure: Enclosure {
            url: format!("{ORIGIN}/favicon.ico"),
            mime_type: "image/x-icon".to_string(),
            length: 0,
        },
        source: SourceRef {
            title: "安康市政府官网".to_string(),
            url: ORIGIN.to_string(),
        },
    },
});

/// The built-in descriptor for the Ankang portal.
pub fn adapter() -> SiteAdapter {
    ADAPTER.clone()
}

/// The Ankang descriptor pointed at another origin, e.g. a local test server.
#[cfg(test)]
pub fn adapter_at(origin: &str) -> SiteAdapter {
    SiteAdapter {
        origin: origin.to_string(),
        ..adapter()
    }
}
