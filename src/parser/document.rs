use scraper::{ElementRef, Html, Node, Selector};

/// Owned view of a parsed page. The DOM itself is dropped once the
/// interesting parts are copied out, so the result can cross await points.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageDocument {
    /// `href` of every anchor, link and area element, in document order.
    pub links: Vec<String>,
    /// `src` of every image, in document order.
    pub images: Vec<String>,
    /// Text nodes joined by newlines, script contents included.
    pub text: String,
    /// Every attribute value on every element.
    pub attributes: Vec<String>,
    /// Bodies of `<!-- -->` comments anywhere in the document.
    pub comments: Vec<String>,
}

impl PageDocument {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);

        let mut links = Vec::new();
        if let Ok(link_sel) = Selector::parse("a[href], link[href], area[href]") {
            for el in document.select(&link_sel) {
                if let Some(href) = el.value().attr("href") {
                    links.push(href.trim().to_string());
                }
            }
        }

        let mut images = Vec::new();
        if let Ok(img_sel) = Selector::parse("img[src]") {
            for el in document.select(&img_sel) {
                if let Some(src) = el.value().attr("src") {
                    images.push(src.trim().to_string());
                }
            }
        }

        let root = document.root_element();
        let text = root
            .text()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let attributes = root
            .descendants()
            .filter_map(ElementRef::wrap)
            .flat_map(|el| el.value().attrs().map(|(_, value)| value.to_string()).collect::<Vec<_>>())
            .filter(|value| !value.is_empty())
            .collect();

        let comments = document
            .tree
            .root()
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Comment(comment) => Some(comment.trim()),
                _ => None,
            })
            .filter(|body| !body.is_empty())
            .map(str::to_string)
            .collect();

        Self { links, images, text, attributes, comments }
    }
}
