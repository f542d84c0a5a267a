// 🕸️ Directory crawler - people listed on the mcml.ai team pages
//
// Layout heuristics, not a parser for a fixed schema: a name-like heading or
// inline element opens a person block, and the links and short lines that
// follow (until the next name) supply role, note and profile URL.

use super::html::{self, Element};
use super::PersonSource;
use crate::error::{LookupError, Result};
use crate::person::{collapse_whitespace, PersonRecord, DEFAULT_ROLE, DIRECTORY_BASE};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TEAM_ROOT: &str = "https://mcml.ai/team/";

pub const SEED_PAGES: [&str; 10] = [
    "https://mcml.ai/team/",
    "https://mcml.ai/team/directors/",
    "https://mcml.ai/team/management/",
    "https://mcml.ai/team/researchgroups/",
    "https://mcml.ai/team/jrgs/",
    "https://mcml.ai/team/juniors/",
    "https://mcml.ai/team/tbfs/",
    "https://mcml.ai/team/strategyboard/",
    "https://mcml.ai/team/advisoryboard/",
    "https://mcml.ai/team/former/",
];

pub const USER_AGENT: &str = concat!(
    "mcml-roster/",
    env!("CARGO_PKG_VERSION"),
    " (+https://mcml.ai/team/)"
);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tags that can hold a person's name
const NAME_TAGS: [&str; 12] = [
    "h1", "h2", "h3", "h4", "h5", "p", "a", "strong", "li", "span", "div", "td",
];

/// Tags scanned after a name for role / note / links
const BLOCK_TAGS: [&str; 8] = ["p", "a", "h3", "h4", "h5", "li", "span", "div"];

/// A name in one of these ends the current person's block
const BLOCK_STOP_TAGS: [&str; 3] = ["h3", "h4", "h5"];

const BLOCK_WINDOW: usize = 30;

/// Longest line still considered a role (longer lines are biographies)
const MAX_ROLE_LINE: usize = 180;

/// Longest section heading used as a fallback role
const MAX_SECTION_ROLE: usize = 30;

const ROLE_KEYWORDS: [&str; 6] = [
    "manager",
    "director",
    "leader",
    "fellow",
    "coordinator",
    "official",
];

const SHORT_ROLE_KEYWORDS: [&str; 3] = ["coordinator", "fellow", "representative"];

/// Lines that are just a title, never a role
const TITLE_LINES: [&str; 6] = ["Prof.", "Prof", "Dr.", "Dr", "Junior", "Representative"];

/// Headings and navigation labels that look like two-word names
const NOT_NAMES: [&str; 16] = [
    "home",
    "team",
    "back to top",
    "board of directors",
    "management team",
    "research groups",
    "junior research groups",
    "junior members",
    "postdocs",
    "phd students",
    "students",
    "strategy board",
    "advisory board",
    "former members",
    "privacy policy",
    "legal notice",
];

// ============================================================================
// FETCHING
// ============================================================================

/// Something that can return a page body for a URL
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP fetcher with the crawler's User-Agent and timeout
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LookupError::scrape(TEAM_ROOT, e))?;
        Ok(HttpFetcher { client })
    }

    fn get(&self, url: &str) -> reqwest::Result<String> {
        self.client.get(url).send()?.error_for_status()?.text()
    }
}

impl PageFetcher for HttpFetcher {
    /// GET the page; an https failure is retried once over plain http
    fn fetch(&self, url: &str) -> Result<String> {
        match self.get(url) {
            Ok(body) => Ok(body),
            Err(first_err) => match url.strip_prefix("https://") {
                Some(rest) => {
                    let alt = format!("http://{}", rest);
                    debug!(url, error = %first_err, "retrying over http");
                    self.get(&alt).map_err(|e| LookupError::scrape(url, e))
                }
                None => Err(LookupError::scrape(url, first_err)),
            },
        }
    }
}

// ============================================================================
// DIRECTORY SOURCE
// ============================================================================

pub struct DirectorySource {
    seeds: Vec<String>,
    discover: bool,
    fetcher: Box<dyn PageFetcher>,
}

impl DirectorySource {
    /// Crawl the live directory: seed pages plus sub-pages linked from the team root
    pub fn new() -> Result<Self> {
        Ok(DirectorySource {
            seeds: SEED_PAGES.iter().map(|s| s.to_string()).collect(),
            discover: true,
            fetcher: Box::new(HttpFetcher::new()?),
        })
    }

    pub fn with_fetcher(fetcher: Box<dyn PageFetcher>) -> Self {
        DirectorySource {
            seeds: SEED_PAGES.iter().map(|s| s.to_string()).collect(),
            discover: true,
            fetcher,
        }
    }

    /// Builder pattern: crawl only these pages (no discovery)
    pub fn with_seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self.discover = false;
        self
    }

    /// Pages to crawl, in order, without duplicates
    pub fn pages(&self) -> Vec<String> {
        let mut pages = self.seeds.clone();
        if self.discover {
            pages.extend(self.discover_pages());
        }

        let pages = dedupe_preserve(pages);
        if pages.is_empty() {
            SEED_PAGES.iter().map(|s| s.to_string()).collect()
        } else {
            pages
        }
    }

    /// Team sub-pages linked from the team root; empty when the root is unreachable
    fn discover_pages(&self) -> Vec<String> {
        match self.fetcher.fetch(TEAM_ROOT) {
            Ok(body) => discover_team_links(&body),
            Err(e) => {
                warn!(error = %e, "page discovery failed, using seed pages");
                Vec::new()
            }
        }
    }
}

impl PersonSource for DirectorySource {
    fn name(&self) -> String {
        TEAM_ROOT.to_string()
    }

    fn fetch_people(&self) -> Result<Vec<PersonRecord>> {
        let pages = self.pages();
        info!(pages = pages.len(), "crawling directory");

        let mut people = Vec::new();
        for page in &pages {
            let body = self.fetcher.fetch(page)?;
            let found = extract_people(&body, page);
            debug!(page = %page, found = found.len(), "scraped page");
            people.extend(found);
        }

        let merged = merge_people(people);
        info!(people = merged.len(), "crawl finished");
        Ok(merged)
    }
}

// ============================================================================
// LINKS
// ============================================================================

/// Resolve an href against the page it appeared on; only http(s) links survive
pub fn absolute_url(page: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let base = Url::parse(page)
        .or_else(|_| Url::parse(DIRECTORY_BASE))
        .ok()?;
    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Links under the team root, fragment and query stripped, trailing slash added
pub fn discover_team_links(body: &str) -> Vec<String> {
    let links = html::elements(body)
        .into_iter()
        .filter(|el| el.tag == "a")
        .filter_map(|el| el.href)
        .filter_map(|href| absolute_url(TEAM_ROOT, &href))
        .filter(|url| url.starts_with(TEAM_ROOT))
        .map(|url| {
            let url = url.split('#').next().unwrap_or("");
            let url = url.split('?').next().unwrap_or("");
            format!("{}/", url.trim_end_matches('/'))
        })
        .collect();

    dedupe_preserve(links)
}

fn dedupe_preserve(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Two to eight name-like tokens, at least three chars, not a known heading
pub fn looks_like_name(text: &str) -> bool {
    let text = collapse_whitespace(text);
    if text.chars().count() < 3 {
        return false;
    }
    if NOT_NAMES.contains(&text.to_lowercase().as_str()) {
        return false;
    }

    let tokens = count_name_tokens(&text);
    (2..=8).contains(&tokens)
}

/// Tokens start with a letter and continue through letters, `'`, `.` and `-`
fn count_name_tokens(text: &str) -> usize {
    let mut count = 0;
    let mut in_token = false;

    for c in text.chars() {
        if in_token {
            if !(c.is_alphabetic() || c == '\'' || c == '.' || c == '-') {
                in_token = false;
            }
        } else if c.is_alphabetic() {
            in_token = true;
            count += 1;
        }
    }

    count
}

/// Group links carry the research-group label ("→ Group Daniel Cremers")
fn is_group_label(text: &str) -> bool {
    text.contains('→') || text.starts_with("Group")
}

fn mentions_role(text: &str) -> bool {
    let lower = text.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .chain(SHORT_ROLE_KEYWORDS.iter())
        .any(|k| lower.contains(k))
}

/// A person's name: name-like text in a name tag, not wrapping another name
fn is_name_element(elements: &[Element], index: usize) -> bool {
    let el = &elements[index];
    NAME_TAGS.contains(&el.tag.as_str())
        && !is_group_label(&el.text)
        && !mentions_role(&el.text)
        && looks_like_name(&el.text)
        && !html::descendants(elements, index)
            .iter()
            .any(|d| NAME_TAGS.contains(&d.tag.as_str()) && looks_like_name(&d.text))
}

struct PersonBlock {
    lines: Vec<String>,
    links: Vec<String>,
    group: Option<(String, Option<String>)>,
}

/// Lines and links following the name at `start`, up to the next person
fn collect_block(elements: &[Element], start: usize, page: &str) -> PersonBlock {
    let mut block = PersonBlock {
        lines: Vec::new(),
        links: Vec::new(),
        group: None,
    };

    // A linked name points at the person's own page
    if let Some(url) = elements[start].href.as_deref().and_then(|h| absolute_url(page, h)) {
        block.links.push(url);
    }

    let following = elements[start + 1..]
        .iter()
        .filter(|el| BLOCK_TAGS.contains(&el.tag.as_str()))
        .take(BLOCK_WINDOW);

    for el in following {
        if BLOCK_STOP_TAGS.contains(&el.tag.as_str()) && looks_like_name(&el.text) {
            break;
        }

        match el.tag.as_str() {
            "a" => {
                let url = el.href.as_deref().and_then(|href| absolute_url(page, href));
                if let Some(url) = &url {
                    block.links.push(url.clone());
                }
                if block.group.is_none() && is_group_label(&el.text) {
                    let label = el.text.replace('→', "").trim().to_string();
                    block.group = Some((label, url));
                }
            }
            "p" | "li" | "span" | "div" if !el.text.is_empty() => block.lines.push(el.text.clone()),
            _ => {}
        }
    }

    block
}

/// Role from the block's short lines, else the section heading, else "Member"
fn pick_role(lines: &[String], section: &str) -> String {
    for line in lines {
        if line.chars().count() > MAX_ROLE_LINE || TITLE_LINES.contains(&line.as_str()) {
            continue;
        }
        let lower = line.to_lowercase();
        if ROLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return line.clone();
        }
        if line.split_whitespace().count() <= 6 && SHORT_ROLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return line.clone();
        }
    }

    if !section.is_empty() && section.chars().count() <= MAX_SECTION_ROLE {
        section.to_string()
    } else {
        DEFAULT_ROLE.to_string()
    }
}

/// Group link first, then links on the directory itself, then anything else
fn pick_profile_url(block: &PersonBlock) -> Option<String> {
    if let Some((_, Some(url))) = &block.group {
        return Some(url.clone());
    }
    block
        .links
        .iter()
        .find(|u| u.starts_with(DIRECTORY_BASE))
        .or_else(|| block.links.first())
        .cloned()
}

/// All people listed on one page, deduplicated on (name, url, role)
pub fn extract_people(body: &str, page: &str) -> Vec<PersonRecord> {
    let elements = html::elements(body);

    let mut section = String::new();
    let mut seen = HashSet::new();
    let mut people = Vec::new();

    for (i, el) in elements.iter().enumerate() {
        if el.tag == "h2" {
            if !el.text.is_empty() {
                section = el.text.clone();
            }
            continue;
        }
        if !is_name_element(&elements, i) {
            continue;
        }

        let block = collect_block(&elements, i, page);
        let role = pick_role(&block.lines, &section);
        let profile_url = pick_profile_url(&block);
        let note = block.group.as_ref().map(|(label, _)| label.as_str()).unwrap_or("");

        let key = (
            el.text.to_lowercase(),
            profile_url.as_deref().unwrap_or("").to_lowercase(),
            role.to_lowercase(),
        );
        if !seen.insert(key) {
            continue;
        }

        let mut record = PersonRecord::from_display_name(&el.text, page)
            .with_role(&role)
            .with_note(note);
        if let Some(url) = profile_url {
            record = record.with_profile_url(&url);
        }
        people.push(record);
    }

    people
}

/// Merge people seen on several pages
///
/// Exact repeats (name, url, role) keep the later sighting; records with the
/// same normalized name keep the one with the highest `richness`, first wins ties.
pub fn merge_people(people: Vec<PersonRecord>) -> Vec<PersonRecord> {
    let mut exact: Vec<PersonRecord> = Vec::new();
    let mut exact_index: HashMap<(String, String, String), usize> = HashMap::new();

    for person in people {
        let key = (
            person.display_name.to_lowercase(),
            person.profile_url.as_deref().unwrap_or("").to_lowercase(),
            person.role.to_lowercase(),
        );
        match exact_index.get(&key) {
            Some(&i) => exact[i] = person,
            None => {
                exact_index.insert(key, exact.len());
                exact.push(person);
            }
        }
    }

    let mut merged: Vec<PersonRecord> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for person in exact {
        let key = person.merge_key();
        match by_name.get(&key) {
            Some(&i) => {
                if person.richness() > merged[i].richness() {
                    merged[i] = person;
                }
            }
            None => {
                by_name.insert(key, merged.len());
                merged.push(person);
            }
        }
    }

    merged
}

// ============================================================================
// TESTS
// ============================================================================
