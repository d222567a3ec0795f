use crate::files::FileDescriptor;

/// What a pattern generator needs to know beyond the file itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Declared output type of the route.
    pub content_type: String,
    /// Route parameters declared in the file's metadata.
    pub query: Vec<String>,
}

pub trait PatternGenerator: Send + Sync {
    fn patterns_for(&self, prefix: &str, file: &FileDescriptor, options: &RenderOptions) -> Vec<String>;
}

/// Extension-less and extension-qualified patterns for every file.
///
/// | file              | prefix  | patterns                                   |
/// |-------------------|---------|--------------------------------------------|
/// | `about.html`      | `/`     | `/about`, `/about.html`                    |
/// | `index.html`      | `/blog` | `/blog`, `/blog/index`, `/blog/index.html` |
/// | `main.scss` (css) | `/css`  | `/css/main`, `/css/main.css`               |
/// | bundle `app` (js) | `/js`   | `/js/app.js`                               |
///
/// The qualified pattern carries the route's output type, not the source
/// extension. Declared parameters are appended as `/:name` to each pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPatterns;

pub fn join(prefix: &str, tail: &str) -> String {
    let mut path = String::from("/");
    for segment in prefix.split('/').chain(tail.split('/')).filter(|s| !s.is_empty()) {
        if path.len() > 1 {
            path.push('/');
        }
        path.push_str(segment);
    }
    path
}

impl PatternGenerator for DefaultPatterns {
    fn patterns_for(&self, prefix: &str, file: &FileDescriptor, options: &RenderOptions) -> Vec<String> {
        let stem = file.stem();
        let qualified = format!("{}.{}", stem, options.content_type);

        let mut patterns = Vec::with_capacity(3);
        if file.is_bundle {
            patterns.push(join(prefix, &qualified));
        } else {
            if stem == "index" || stem.ends_with("/index") {
                patterns.push(join(prefix, stem.trim_end_matches("index")));
            }
            patterns.push(join(prefix, stem));
            patterns.push(join(prefix, &qualified));
        }

        if !options.query.is_empty() {
            let params: String = options.query.iter().map(|name| format!("/:{}", name)).collect();
            for pattern in &mut patterns {
                *pattern = join(pattern, &params);
            }
        }
        patterns.dedup();
        patterns
    }
}
