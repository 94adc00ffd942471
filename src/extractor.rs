use scraper::{ElementRef, Html, Selector};

use crate::models::Observation;
use crate::plugins::trackers::PriceTracker;

/// Price badges, most specific first: primary badge, deal, our-price and
/// sale blocks, generic colour badge, feature and mobile layouts.
pub const PRICE_SELECTORS: &[&str] = &[
    ".a-price .a-offscreen",
    "#priceblock_dealprice",
    "#priceblock_ourprice",
    "#priceblock_saleprice",
    ".a-color-price",
    "#corePrice_feature_div .a-offscreen",
    "#corePriceDisplay_mobile_feature_div .a-offscreen",
    "span.a-price span.a-offscreen",
];

/// Hidden input carrying the raw price in its `value` attribute.
pub const HIDDEN_PRICE_SELECTOR: &str = "#twister-plus-price-data-price";

pub const AVAILABILITY_SELECTORS: &[&str] = &["#availability", "#outOfStock"];

pub const PURCHASE_CONTROL_SELECTORS: &[&str] = &[
    "#add-to-cart-button",
    "#buy-now-button",
    "input[name='submit.add-to-cart']",
    "input[name='submit.buy-now']",
];

pub const UNAVAILABLE_PHRASES: &[&str] = &["unavailable", "temporarily out of stock"];

const NON_VISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// One step of the price cascade. Each strategy only looks at the page and
/// returns raw price text, or `None` to hand over to the next one.
pub enum PriceStrategy {
    Badge { css: &'static str, selector: Selector },
    HiddenValue { css: &'static str, selector: Selector },
    MarkedText,
}

impl PriceStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PriceStrategy::Badge { css, .. } => *css,
            PriceStrategy::HiddenValue { css, .. } => *css,
            PriceStrategy::MarkedText => "text pattern",
        }
    }

    pub fn find(&self, document: &Html, tracker: &PriceTracker) -> Option<String> {
        match self {
            PriceStrategy::Badge { selector, .. } => document
                .select(selector)
                .next()
                .map(visible_text)
                .filter(|text| text.chars().any(|c| c.is_ascii_digit())),
            PriceStrategy::HiddenValue { selector, .. } => document
                .select(selector)
                .next()
                .and_then(|el| el.value().attr("value"))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            PriceStrategy::MarkedText => {
                let text = page_text(document);
                tracker.find_marked_price(&text).map(str::to_string)
            }
        }
    }
}

/// Turns a rendered product page into an [`Observation`]. Never fails:
/// anything it cannot read degrades to no price and not in stock.
pub struct Extractor {
    strategies: Vec<PriceStrategy>,
    availability: Vec<Selector>,
    purchase_controls: Vec<Selector>,
    tracker: PriceTracker,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        let mut strategies: Vec<PriceStrategy> = PRICE_SELECTORS
            .iter()
            .map(|&css| PriceStrategy::Badge { css, selector: parse_selector(css) })
            .collect();
        strategies.push(PriceStrategy::HiddenValue {
            css: HIDDEN_PRICE_SELECTOR,
            selector: parse_selector(HIDDEN_PRICE_SELECTOR),
        });
        strategies.push(PriceStrategy::MarkedText);

        Extractor {
            strategies,
            availability: AVAILABILITY_SELECTORS.iter().map(|s| parse_selector(s)).collect(),
            purchase_controls: PURCHASE_CONTROL_SELECTORS.iter().map(|s| parse_selector(s)).collect(),
            tracker: PriceTracker::new(),
        }
    }

    pub fn strategies(&self) -> &[PriceStrategy] {
        &self.strategies
    }

    pub fn extract(&self, page: &str) -> Observation {
        let document = Html::parse_document(page);
        let price = self
            .price_text(&document)
            .and_then(|(strategy, text)| {
                let parsed = self.tracker.parse(&text);
                if parsed.is_none() {
                    tracing::debug!("Price text {:?} from {} did not parse", text, strategy);
                }
                parsed
            });

        Observation {
            price,
            in_stock: self.in_stock(&document),
        }
    }

    /// Runs the cascade; the first strategy to produce text wins.
    pub fn price_text(&self, document: &Html) -> Option<(&'static str, String)> {
        self.strategies.iter().find_map(|strategy| {
            strategy.find(document, &self.tracker).map(|text| {
                tracing::debug!("Found price via {}: {}", strategy.name(), text);
                (strategy.name(), text)
            })
        })
    }

    /// In stock only with positive evidence (a buy control) and no
    /// unavailability notice. A half-rendered page reads as out of stock.
    pub fn in_stock(&self, document: &Html) -> bool {
        let availability = self
            .availability
            .iter()
            .flat_map(|selector| document.select(selector))
            .map(visible_text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        if UNAVAILABLE_PHRASES.iter().any(|phrase| availability.contains(phrase)) {
            return false;
        }

        self.purchase_controls
            .iter()
            .any(|selector| document.select(selector).next().is_some())
    }
}

fn parse_selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e:?}"))
}

fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the whole page, skipping script and style bodies.
fn page_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                .is_some_and(|name| NON_VISIBLE_TAGS.contains(&name));
            if hidden { None } else { Some(&**text) }
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
