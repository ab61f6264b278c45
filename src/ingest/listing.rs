use scraper::{Html, Selector};

/// `.nc` hrefs on a directory listing page, in page order without repeats.
pub fn nc_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links: Vec<String> = Vec::new();
    for href in document.select(&anchors).filter_map(|a| a.value().attr("href")) {
        if href.ends_with(".nc") && !links.iter().any(|l| l == href) {
            links.push(href.to_string());
        }
    }
    links
}

/// File name to store a listed link under.
pub fn file_name(link: &str) -> Option<&str> {
    link.rsplit('/').next().filter(|name| !name.is_empty() && *name != "..")
}
