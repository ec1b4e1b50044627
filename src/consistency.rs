//! Link & asset consistency across language variants.
//!
//! - internal `/tips/<slug>` links must point at published items in the
//!   same language
//! - every variant shows the original's thumbnail
//! - related posts are linked inline and listed under a localized heading

use crate::content::{ContentId, ContentItem};
use crate::i18n::Language;
use crate::store::{load_all_groups, ContentStore, ContentUpdate, StoreError};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Most related items linked from one post.
pub const MAX_RELATED: usize = 5;

const RELATED_SECTION_CLASS: &str = "related-posts";

static TIP_LINK_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_NAME_REGEX: OnceLock<Regex> = OnceLock::new();
static RELATED_SECTION_REGEX: OnceLock<Regex> = OnceLock::new();

fn tip_link_regex() -> &'static Regex {
    TIP_LINK_REGEX.get_or_init(|| {
        Regex::new(r#"href\s*=\s*["'](?:/([a-z]{2}))?/tips/([^"'/?#]+)/?(?:[?#][^"']*)?["']"#)
            .expect("Invalid tip link regex")
    })
}

fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"))
}

fn tag_name_regex() -> &'static Regex {
    TAG_NAME_REGEX
        .get_or_init(|| Regex::new(r"^<\s*(/)?\s*([A-Za-z][A-Za-z0-9]*)").expect("Invalid tag name regex"))
}

fn related_section_regex() -> &'static Regex {
    RELATED_SECTION_REGEX.get_or_init(|| {
        Regex::new(r#"(?s)\n?<section class="related-posts">.*?</section>"#)
            .expect("Invalid related section regex")
    })
}

// ==================== Internal links ====================

/// A relative tip link found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TipLink {
    prefix: Option<String>,
    slug: String,
}

fn extract_tip_links(html: &str) -> Vec<TipLink> {
    tip_link_regex()
        .captures_iter(html)
        .map(|cap| TipLink {
            prefix: cap.get(1).map(|m| m.as_str().to_string()),
            slug: cap[2].to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCheck {
    pub passed: bool,
    pub links_checked: usize,
    /// Slugs that do not resolve, in document order
    pub broken: Vec<String>,
}

/// Check every relative tip link in `html` as seen from a `language` page.
///
/// A link passes when it resolves to a published item in the same language.
/// A document without links passes.
pub async fn validate_internal_links(
    store: &dyn ContentStore,
    html: &str,
    language: Language,
) -> Result<LinkCheck, StoreError> {
    let links = extract_tip_links(html);
    let mut broken = Vec::new();

    for link in &links {
        let prefix_matches = link
            .prefix
            .as_deref()
            .map_or(true, |code| code == language.code());

        let resolves = prefix_matches
            && store
                .find_by_slug(language, &link.slug)
                .await?
                .is_some_and(|item| item.is_published);

        if !resolves {
            debug!("Broken link to '{}' from a {} page", link.slug, language);
            broken.push(link.slug.clone());
        }
    }

    Ok(LinkCheck {
        passed: broken.is_empty(),
        links_checked: links.len(),
        broken,
    })
}

/// Broken links of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLinks {
    pub item_id: ContentId,
    pub slug: String,
    pub broken: Vec<String>,
}

/// Check the bodies of every published item in `language`.
///
/// Only failing items are returned.
pub async fn check_all_links(
    store: &dyn ContentStore,
    language: Language,
) -> Result<Vec<BrokenLinks>, StoreError> {
    let items = store.list_published(language).await?;
    let mut failing = Vec::new();

    for item in &items {
        let check = validate_internal_links(store, &item.body, language).await?;
        if !check.passed {
            failing.push(BrokenLinks {
                item_id: item.id,
                slug: item.slug.clone(),
                broken: check.broken,
            });
        }
    }

    if failing.is_empty() {
        info!("✓ All links valid in {} ({} items)", language, items.len());
    } else {
        warn!(
            "{} of {} {} items have broken links",
            failing.len(),
            items.len(),
            language
        );
    }
    Ok(failing)
}

// ==================== Assets ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetChange {
    pub item_id: ContentId,
    pub language: Language,
    pub old_thumbnail: Option<String>,
    pub new_thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetReport {
    pub groups_checked: usize,
    pub changes: Vec<AssetChange>,
}

/// Copy each original's thumbnail onto every variant that differs.
pub async fn unify_thumbnails(store: &dyn ContentStore) -> Result<AssetReport, StoreError> {
    let groups = load_all_groups(store).await?;
    let mut report = AssetReport {
        groups_checked: groups.len(),
        changes: Vec::new(),
    };

    for group in &groups {
        let authoritative = &group.original.thumbnail;
        for variant in &group.variants {
            if &variant.thumbnail == authoritative {
                continue;
            }

            store
                .update_item(
                    variant.id,
                    ContentUpdate {
                        thumbnail: Some(authoritative.clone()),
                        ..ContentUpdate::default()
                    },
                )
                .await?;

            report.changes.push(AssetChange {
                item_id: variant.id,
                language: variant.language,
                old_thumbnail: variant.thumbnail.clone(),
                new_thumbnail: authoritative.clone(),
            });
        }
    }

    info!(
        "✓ Thumbnails unified: {} change(s) across {} group(s)",
        report.changes.len(),
        report.groups_checked
    );
    Ok(report)
}

// ==================== Related content ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedLinking {
    /// Related items, highest view count first
    pub related: Vec<ContentId>,
    /// Titles linked inside the body text
    pub inline_links: usize,
    pub body: String,
}

/// Published items in `item`'s language (other than `item`) whose title or
/// body contains any keyword, most viewed first.
pub async fn find_related(
    store: &dyn ContentStore,
    item: &ContentItem,
    keywords: &[String],
) -> Result<Vec<ContentItem>, StoreError> {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if needles.is_empty() {
        return Ok(Vec::new());
    }

    let mut related: Vec<ContentItem> = store
        .list_published(item.language)
        .await?
        .into_iter()
        .filter(|candidate| candidate.id != item.id)
        .filter(|candidate| {
            let title = candidate.title.to_lowercase();
            let body = candidate.body.to_lowercase();
            needles
                .iter()
                .any(|n| title.contains(n.as_str()) || body.contains(n.as_str()))
        })
        .collect();

    related.sort_by(|a, b| b.view_count.cmp(&a.view_count).then(a.id.cmp(&b.id)));
    related.truncate(MAX_RELATED);
    Ok(related)
}

/// Link related posts from `item`'s body and store the result.
///
/// Each related title is linked at its first occurrence in visible text
/// outside existing anchors. A localized list of the related posts goes
/// before `</article>` (or at the end), replacing any earlier list.
pub async fn link_related_content(
    store: &dyn ContentStore,
    item: &ContentItem,
    keywords: &[String],
) -> Result<RelatedLinking, StoreError> {
    let related = find_related(store, item, keywords).await?;
    if related.is_empty() {
        return Ok(RelatedLinking {
            related: Vec::new(),
            inline_links: 0,
            body: item.body.clone(),
        });
    }

    let mut body = related_section_regex().replace_all(&item.body, "").into_owned();
    let mut inline_links = 0;

    for candidate in &related {
        let href = tip_href(candidate);
        if body.contains(&format!("href=\"{}\"", href)) {
            continue;
        }
        if let Some(linked) = link_first_visible(&body, &candidate.title, &href) {
            body = linked;
            inline_links += 1;
        }
    }

    let section = related_section(item.language, &related);
    body = match body.rfind("</article>") {
        Some(pos) => format!("{}{}\n{}", &body[..pos], section, &body[pos..]),
        None => format!("{}\n{}", body, section),
    };

    store
        .update_item(
            item.id,
            ContentUpdate {
                body: Some(body.clone()),
                ..ContentUpdate::default()
            },
        )
        .await?;

    info!(
        "Linked {} related post(s) from '{}' ({} inline)",
        related.len(),
        item.slug,
        inline_links
    );

    Ok(RelatedLinking {
        related: related.iter().map(|r| r.id).collect(),
        inline_links,
        body,
    })
}

fn tip_href(item: &ContentItem) -> String {
    format!("/tips/{}", item.slug)
}

fn related_section(language: Language, related: &[ContentItem]) -> String {
    let items: String = related
        .iter()
        .map(|r| {
            format!(
                "<li><a href=\"{}\">{}</a></li>",
                tip_href(r),
                escape_html(&r.title)
            )
        })
        .collect();

    format!(
        "<section class=\"{}\"><h2>{}</h2><ul>{}</ul></section>",
        RELATED_SECTION_CLASS,
        language.config().strings.related_posts_heading,
        items
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wrap the first visible occurrence of `needle` in a link to `href`.
///
/// Text inside tags (attribute values included), anchors, scripts and
/// styles is never touched.
fn link_first_visible(html: &str, needle: &str, href: &str) -> Option<String> {
    if needle.trim().is_empty() {
        return None;
    }

    let mut hidden_depth = 0usize;
    let mut cursor = 0;

    for tag in tag_regex().find_iter(html) {
        if hidden_depth == 0 {
            if let Some(pos) = html[cursor..tag.start()].find(needle) {
                return Some(splice_link(html, cursor + pos, needle, href));
            }
        }

        if let Some(cap) = tag_name_regex().captures(tag.as_str()) {
            let closing = cap.get(1).is_some();
            let name = cap[2].to_ascii_lowercase();
            if matches!(name.as_str(), "a" | "script" | "style") {
                if closing {
                    hidden_depth = hidden_depth.saturating_sub(1);
                } else if !tag.as_str().ends_with("/>") {
                    hidden_depth += 1;
                }
            }
        }
        cursor = tag.end();
    }

    if hidden_depth == 0 {
        if let Some(pos) = html[cursor..].find(needle) {
            return Some(splice_link(html, cursor + pos, needle, href));
        }
    }
    None
}

fn splice_link(html: &str, start: usize, needle: &str, href: &str) -> String {
    let end = start + needle.len();
    format!(
        "{}<a href=\"{}\">{}</a>{}",
        &html[..start],
        href,
        &html[start..end],
        &html[end..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::original;
    use crate::store::MemoryStore;

    async fn insert(
        store: &MemoryStore,
        slug: &str,
        language: Language,
        title: &str,
        body: &str,
        original_id: Option<ContentId>,
    ) -> ContentItem {
        let mut item = original(slug, title);
        item.language = language;
        item.body = body.to_string();
        item.original_id = original_id;
        store.insert_item(item).await.expect("insert")
    }

    // ==================== Link Validation Tests ====================

    #[test]
    fn test_extract_tip_links() {
        let html = r#"<a href="/tips/usim-guide">x</a> <a href="/vi/tips/esim-vi?ref=1">y</a>
            <a href="https://example.com/tips/external">z</a> <a href='/tips/single/'>w</a>"#;
        let links = extract_tip_links(html);

        assert_eq!(links.len(), 3);
        assert_eq!(links[0].slug, "usim-guide");
        assert_eq!(links[0].prefix, None);
        assert_eq!(links[1].slug, "esim-vi");
        assert_eq!(links[1].prefix.as_deref(), Some("vi"));
        assert_eq!(links[2].slug, "single");
    }

    #[tokio::test]
    async fn test_no_links_passes() {
        let store = MemoryStore::new();
        let check = validate_internal_links(&store, "<p>No links</p>", Language::KOREAN)
            .await
            .expect("check");
        assert!(check.passed);
        assert_eq!(check.links_checked, 0);
    }

    #[tokio::test]
    async fn test_link_to_published_same_language_passes() {
        let store = MemoryStore::new();
        let a = insert(&store, "a", Language::KOREAN, "가", "", None).await;
        insert(&store, "a-en", Language::ENGLISH, "A", "", Some(a.id)).await;

        let check = validate_internal_links(
            &store,
            r#"<a href="/tips/a-en">A</a> <a href="/en/tips/a-en">A</a>"#,
            Language::ENGLISH,
        )
        .await
        .expect("check");
        assert!(check.passed);
        assert_eq!(check.links_checked, 2);
    }

    #[tokio::test]
    async fn test_cross_language_link_is_broken() {
        let store = MemoryStore::new();
        insert(&store, "a", Language::KOREAN, "가", "", None).await;

        // The Korean slug does not exist in English
        let check = validate_internal_links(&store, r#"<a href="/tips/a">A</a>"#, Language::ENGLISH)
            .await
            .expect("check");
        assert!(!check.passed);
        assert_eq!(check.broken, vec!["a".to_string()]);

        // Language prefix must match the page language
        let check = validate_internal_links(&store, r#"<a href="/en/tips/a">A</a>"#, Language::KOREAN)
            .await
            .expect("check");
        assert!(!check.passed);
    }

    #[tokio::test]
    async fn test_link_to_unpublished_is_broken() {
        let store = MemoryStore::new();
        let mut draft = original("draft", "초안");
        draft.is_published = false;
        store.insert_item(draft).await.expect("insert");

        let check = validate_internal_links(&store, r#"<a href="/tips/draft">d</a>"#, Language::KOREAN)
            .await
            .expect("check");
        assert!(!check.passed);
        assert_eq!(check.broken, vec!["draft".to_string()]);
    }

    #[tokio::test]
    async fn test_check_all_links_reports_failing_items() {
        let store = MemoryStore::new();
        insert(&store, "good", Language::KOREAN, "좋음", r#"<a href="/tips/bad">x</a>"#, None)
            .await;
        let bad = insert(
            &store,
            "bad",
            Language::KOREAN,
            "나쁨",
            r#"<a href="/tips/missing">x</a>"#,
            None,
        )
        .await;

        let failing = check_all_links(&store, Language::KOREAN).await.expect("scan");
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].item_id, bad.id);
        assert_eq!(failing[0].broken, vec!["missing".to_string()]);
    }

    // ==================== Asset Tests ====================

    #[tokio::test]
    async fn test_unify_thumbnails() {
        let store = MemoryStore::new();
        let a = insert(&store, "a", Language::KOREAN, "가", "", None).await;
        let mut en = original("a-en", "A");
        en.language = Language::ENGLISH;
        en.original_id = Some(a.id);
        en.thumbnail = Some("/images/old.png".to_string());
        let en = store.insert_item(en).await.expect("insert");
        let mut vi = original("a-vi", "A");
        vi.language = Language::VIETNAMESE;
        vi.original_id = Some(a.id);
        vi.thumbnail = a.thumbnail.clone();
        store.insert_item(vi).await.expect("insert");

        let report = unify_thumbnails(&store).await.expect("unify");
        assert_eq!(report.groups_checked, 1);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].item_id, en.id);
        assert_eq!(report.changes[0].old_thumbnail.as_deref(), Some("/images/old.png"));

        let updated = store.get_item(en.id).await.expect("get").expect("exists");
        assert_eq!(updated.thumbnail, a.thumbnail);

        // Second run changes nothing
        let writes = store.write_count().await;
        let report = unify_thumbnails(&store).await.expect("unify");
        assert!(report.changes.is_empty());
        assert_eq!(store.write_count().await, writes);
    }

    // ==================== Related Content Tests ====================

    #[test]
    fn test_link_first_visible_skips_attributes_and_anchors() {
        let html = r#"<img alt="eSIM guide"><a href="/x">eSIM guide</a><p>Read the eSIM guide.</p>"#;
        let linked = link_first_visible(html, "eSIM guide", "/tips/esim").expect("linked");
        assert_eq!(
            linked,
            r#"<img alt="eSIM guide"><a href="/x">eSIM guide</a><p>Read the <a href="/tips/esim">eSIM guide</a>.</p>"#
        );
    }

    #[test]
    fn test_link_first_visible_no_visible_match() {
        let html = r#"<a href="/x"><b>eSIM guide</b></a><script>var t = "eSIM guide";</script>"#;
        assert_eq!(link_first_visible(html, "eSIM guide", "/tips/esim"), None);
    }

    #[tokio::test]
    async fn test_related_ranked_by_views_and_capped() {
        let store = MemoryStore::new();
        let current = insert(&store, "current", Language::KOREAN, "유심 개통", "<p>유심</p>", None).await;
        let mut ids = Vec::new();
        for i in 0..7 {
            let item = insert(
                &store,
                &format!("r{}", i),
                Language::KOREAN,
                &format!("유심 팁 {}", i),
                "<p>본문</p>",
                None,
            )
            .await;
            store.set_view_count(item.id, i * 10).await.expect("views");
            ids.push(item.id);
        }
        insert(&store, "other", Language::KOREAN, "환전", "<p>환전</p>", None).await;

        let related = find_related(&store, &current, &["유심".to_string()])
            .await
            .expect("related");

        assert_eq!(related.len(), MAX_RELATED);
        let related_ids: Vec<ContentId> = related.iter().map(|r| r.id).collect();
        assert_eq!(related_ids, vec![ids[6], ids[5], ids[4], ids[3], ids[2]]);
        assert!(!related_ids.contains(&current.id));
    }

    #[tokio::test]
    async fn test_related_keyword_case_insensitive_same_language() {
        let store = MemoryStore::new();
        let a = insert(&store, "a", Language::KOREAN, "가", "", None).await;
        let current = insert(&store, "cur-en", Language::ENGLISH, "Current", "", Some(a.id)).await;
        let b = insert(&store, "b", Language::KOREAN, "나", "", None).await;
        let match_en = insert(&store, "b-en", Language::ENGLISH, "ESIM setup", "", Some(b.id)).await;
        insert(&store, "c", Language::KOREAN, "esim 한국어", "", None).await;

        let related = find_related(&store, &current, &["esim".to_string()])
            .await
            .expect("related");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, match_en.id);
    }

    #[tokio::test]
    async fn test_link_related_content_inserts_links_and_section() {
        let store = MemoryStore::new();
        let b = insert(&store, "b", Language::KOREAN, "나", "", None).await;
        let related = insert(&store, "b-vi", Language::VIETNAMESE, "Hướng dẫn eSIM", "", Some(b.id)).await;
        let a = insert(&store, "a", Language::KOREAN, "가", "", None).await;
        let current = insert(
            &store,
            "a-vi",
            Language::VIETNAMESE,
            "Mua SIM",
            r#"<article><p>Xem Hướng dẫn eSIM để biết thêm.</p></article>"#,
            Some(a.id),
        )
        .await;

        let result = link_related_content(&store, &current, &["esim".to_string()])
            .await
            .expect("link");

        assert_eq!(result.related, vec![related.id]);
        assert_eq!(result.inline_links, 1);
        assert!(result
            .body
            .contains(r#"Xem <a href="/tips/b-vi">Hướng dẫn eSIM</a> để"#));
        let heading = Language::VIETNAMESE.config().strings.related_posts_heading;
        assert!(result.body.contains(heading));
        assert!(result.body.ends_with("</section>\n</article>"));

        let stored = store.get_item(current.id).await.expect("get").expect("exists");
        assert_eq!(stored.body, result.body);

        // Running again replaces the section instead of adding a second one
        let again = link_related_content(&store, &stored, &["esim".to_string()])
            .await
            .expect("link");
        assert_eq!(again.body.matches("related-posts").count(), 1);
        assert_eq!(again.body.matches("href=\"/tips/b-vi\"").count(), 2);

        let check = validate_internal_links(&store, &again.body, Language::VIETNAMESE)
            .await
            .expect("check");
        assert!(check.passed);
    }

    #[tokio::test]
    async fn test_link_related_content_appends_without_article() {
        let store = MemoryStore::new();
        let current = insert(&store, "cur", Language::KOREAN, "현재", "<p>본문</p>", None).await;
        insert(&store, "other", Language::KOREAN, "유심 팁", "<p>유심</p>", None).await;

        let result = link_related_content(&store, &current, &["유심".to_string()])
            .await
            .expect("link");
        assert_eq!(result.inline_links, 0);
        assert!(result.body.starts_with("<p>본문</p>\n<section"));
        assert!(result.body.ends_with("</section>"));
    }

    #[tokio::test]
    async fn test_link_related_content_without_matches_writes_nothing() {
        let store = MemoryStore::new();
        let current = insert(&store, "cur", Language::KOREAN, "현재", "<p>본문</p>", None).await;
        let writes = store.write_count().await;

        let result = link_related_content(&store, &current, &["없음".to_string()])
            .await
            .expect("link");
        assert!(result.related.is_empty());
        assert_eq!(result.body, current.body);
        assert_eq!(store.write_count().await, writes);
    }
}
