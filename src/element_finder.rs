use scraper::{ElementRef, Html, Selector};

use crate::utils::error::{AppError, Result};

/// Element picked by an [`ElementFinder`], along with the selector that hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMatch {
    pub selector: String,
    pub text: String,
}

/// An ordered list of CSS selectors tried against a document; the first one that matches wins.
#[derive(Debug, Clone)]
pub struct ElementFinder {
    selectors: Vec<(String, Selector)>,
}

impl ElementFinder {
    pub fn new<S: AsRef<str>>(selectors: &[S]) -> Result<Self> {
        let selectors = selectors
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                Selector::parse(raw)
                    .map(|parsed| (raw.to_string(), parsed))
                    .map_err(|e| AppError::Parse {
                        message: format!("Invalid CSS selector '{}': {:?}", raw, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { selectors })
    }

    pub fn find_first(&self, document: &Html) -> Option<ElementMatch> {
        self.selectors.iter().find_map(|(raw, selector)| {
            document.select(selector).next().map(|element| ElementMatch {
                selector: raw.clone(),
                text: element_text(element),
            })
        })
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(|(raw, _)| raw.as_str())
    }
}

/// All text under `element`, concatenated and trimmed.
pub fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
