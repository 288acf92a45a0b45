use chrono::{DateTime, Utc};

use super::preferences::{Category, Icon, SiteEntry, UserPreferences};

type SiteSeed = (&'static str, &'static str, &'static str);

/// Built-in catalogue: (category, description, [(site, icon id, url template)]).
const CATALOGUE: &[(&str, &str, &[SiteSeed])] = &[
    (
        "Search",
        "Search engines and web search platforms",
        &[
            ("Google", "google", "https://www.google.com/search?q={q}"),
            ("Bing", "bing", "https://www.bing.com/search?q={q}"),
            ("DuckDuckGo", "duckduckgo", "https://duckduckgo.com/?q={q}"),
            ("Startpage", "startpage", "https://www.startpage.com/sp/search?query={q}"),
            ("Ecosia", "ecosia", "https://www.ecosia.org/search?q={q}"),
            ("Yandex", "yandex", "https://yandex.com/search/?text={q}"),
            ("Brave Search", "brave", "https://search.brave.com/search?q={q}"),
        ],
    ),
    (
        "AI",
        "AI chat and search platforms",
        &[
            ("ChatGPT", "chatgpt", "https://chat.openai.com/"),
            ("Perplexity", "perplexity", "https://www.perplexity.ai/"),
            ("Claude", "claude", "https://claude.ai/"),
            ("Copilot", "copilot", "https://copilot.microsoft.com/"),
            ("HuggingChat", "huggingface", "https://huggingface.co/chat"),
            ("Mistral", "mistral", "https://chat.mistral.ai/"),
            ("Gemini", "gemini", "https://gemini.google.com/"),
            ("Meta AI", "meta_ai", "https://www.meta.ai/"),
        ],
    ),
    (
        "Video",
        "Video streaming and sharing platforms",
        &[
            ("YouTube", "youtube", "https://www.youtube.com/results?search_query={q}"),
            ("Vimeo", "vimeo", "https://vimeo.com/search?q={q}"),
            ("Dailymotion", "dailymotion", "https://www.dailymotion.com/search/{q}"),
        ],
    ),
    (
        "Photo",
        "Photo and image resource platforms",
        &[
            ("Pinterest", "pinterest", "https://www.pinterest.com/search/pins/?q={q}"),
            ("Unsplash", "unsplash", "https://unsplash.com/s/photos/{q}"),
            ("Pexels", "pexels", "https://www.pexels.com/search/{q}/"),
            ("Pixabay", "pixabay", "https://pixabay.com/images/search/{q}"),
            ("Getty Images", "gettyimages", "https://www.gettyimages.com/photos/{q}"),
            ("Shutterstock", "shutterstock", "https://www.shutterstock.com/search/{q}"),
            ("Flickr", "flickr", "https://www.flickr.com/search/?text={q}"),
            ("Adobe Stock", "stock_adobe", "https://stock.adobe.com/search?k={q}"),
        ],
    ),
    (
        "Shopping",
        "Online shopping and retail platforms",
        &[
            ("Amazon", "amazon", "https://www.amazon.com/s?k={q}"),
            ("eBay", "ebay", "https://www.ebay.com/sch/i.html?_nkw={q}"),
            ("Walmart", "walmart", "https://www.walmart.com/search?q={q}"),
            ("AliExpress", "aliexpress", "https://www.aliexpress.com/wholesale?SearchText={q}"),
            ("Best Buy", "bestbuy", "https://www.bestbuy.com/site/searchpage.jsp?st={q}"),
            ("Target", "target", "https://www.target.com/s?searchTerm={q}"),
            ("Etsy", "etsy", "https://www.etsy.com/search?q={q}"),
        ],
    ),
    (
        "Social",
        "Social media and networking platforms",
        &[
            ("X", "x", "https://x.com/search?q={q}&f=user"),
            ("Facebook", "facebook", "https://www.facebook.com/search/top/?q={q}"),
            ("Instagram", "instagram", "https://www.instagram.com/explore/tags/{q}/"),
            ("Reddit", "reddit", "https://www.reddit.com/search/?q={q}"),
            ("LinkedIn", "linkedin", "https://www.linkedin.com/search/results/all/?keywords={q}"),
            ("TikTok", "tiktok", "https://www.tiktok.com/search?q={q}"),
        ],
    ),
    (
        "News",
        "News and media information sources",
        &[
            ("Google News", "news_google_com", "https://news.google.com/search?q={q}"),
            ("BBC News", "bbc", "https://www.bbc.co.uk/search?q={q}"),
            ("CNN", "cnn", "https://edition.cnn.com/search?q={q}"),
            ("Reuters", "reuters", "https://www.reuters.com/search/news?blob={q}"),
            ("The Guardian", "guardian", "https://www.theguardian.com/uk/{q}"),
            ("New York Times", "nyt", "https://www.nytimes.com/search?query={q}"),
            ("Al Jazeera", "aljazeera", "https://www.aljazeera.com/search/{q}"),
        ],
    ),
    (
        "Finance",
        "Finance and stock market platforms",
        &[
            ("Yahoo Finance", "yahoo", "https://finance.yahoo.com/quote/{q}"),
            ("Google Finance", "googlefinance", "https://www.google.com/finance/quote/{q}"),
            ("TradingView", "tradingview", "https://www.tradingview.com/chart/?symbol={q}"),
            ("Moneycontrol", "moneycontrol", "https://www.moneycontrol.com/india/stockpricequote/{q}"),
            ("NSE India", "nse", "https://www.nseindia.com/get-quotes/equity?symbol={q}"),
        ],
    ),
];

/// Categories every new user starts with, all sites enabled.
pub fn default_engine() -> Vec<Category> {
    CATALOGUE
        .iter()
        .map(|(name, description, sites)| Category {
            category_name: (*name).to_string(),
            description: (*description).to_string(),
            url: sites
                .iter()
                .map(|(site_name, icon_id, site_url)| SiteEntry {
                    site_name: (*site_name).to_string(),
                    site_url: (*site_url).to_string(),
                    icon: Some(Icon::new(*icon_id, format!("/temp/{icon_id}.png"))),
                    is_checked: true,
                })
                .collect(),
        })
        .collect()
}

pub fn default_category_names() -> Vec<String> {
    CATALOGUE
        .iter()
        .map(|(name, _, _)| (*name).to_string())
        .collect()
}

pub fn default_preferences(user_id: &str, at: DateTime<Utc>) -> UserPreferences {
    UserPreferences::with_engine(user_id, default_engine(), at)
}
