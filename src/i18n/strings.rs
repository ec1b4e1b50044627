/// Localized strings inserted into generated content
///
/// Strings are stored raw; callers HTML-escape them when embedding.
#[derive(Debug, Clone)]
pub struct LanguageStrings {
    /// Heading of the related-posts section appended to tip bodies
    pub related_posts_heading: &'static str,
}

pub const KOREAN_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "관련 글",
};

pub const ENGLISH_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Related Posts",
};

pub const CHINESE_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "相关文章",
};

pub const JAPANESE_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "関連記事",
};

pub const VIETNAMESE_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Bài viết liên quan",
};

pub const THAI_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "บทความที่เกี่ยวข้อง",
};

pub const RUSSIAN_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Похожие статьи",
};

pub const MONGOLIAN_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Холбоотой нийтлэлүүд",
};

pub const UZBEK_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Tegishli maqolalar",
};

pub const NEPALI_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "सम्बन्धित लेखहरू",
};

pub const BURMESE_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "ဆက်စပ်ဆောင်းပါးများ",
};

pub const INDONESIAN_STRINGS: LanguageStrings = LanguageStrings {
    related_posts_heading: "Artikel Terkait",
};
