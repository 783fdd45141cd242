// src/config/model.rs

use serde::Deserialize;

use crate::types::GlobList;

/// Top-level configuration as read from `wpwatch.toml`.
///
/// ```toml
/// project_url = "http://mytheme.local"
///
/// [paths]
/// sass_src = "./sass/**/*.scss"
/// sass_dest = "./"
/// js_src = "./js/*.js"
/// js_dest = "./js/min/"
///
/// [server]
/// port = 3000
/// ```
///
/// Every section is optional; defaults follow the usual underscores-based
/// theme layout.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Upstream site proxied by the reload server.
    #[serde(default)]
    pub project_url: Option<String>,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub tools: ToolsSection,

    #[serde(default)]
    pub housekeeping: HousekeepingSection,

    #[serde(default)]
    pub notify: NotifySection,
}

/// Validated configuration. Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    project_url: Option<String>,
    paths: PathsSection,
    server: ServerSection,
    tools: ToolsSection,
    housekeeping: HousekeepingSection,
    notify: NotifySection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project_url: raw.project_url,
            paths: raw.paths,
            server: raw.server,
            tools: raw.tools,
            housekeeping: raw.housekeeping,
            notify: raw.notify,
        }
    }

    pub fn project_url(&self) -> Option<&str> {
        self.project_url.as_deref()
    }

    pub fn paths(&self) -> &PathsSection {
        &self.paths
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn tools(&self) -> &ToolsSection {
        &self.tools
    }

    pub fn housekeeping(&self) -> &HousekeepingSection {
        &self.housekeeping
    }

    pub fn notify(&self) -> &NotifySection {
        &self.notify
    }
}

/// `[paths]` section: every source glob and destination directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_sass_src")]
    pub sass_src: GlobList,
    #[serde(default = "default_sass_dest")]
    pub sass_dest: String,

    #[serde(default = "default_js_src")]
    pub js_src: GlobList,
    #[serde(default = "default_js_dest")]
    pub js_dest: String,

    #[serde(default = "default_js_vendor_src")]
    pub js_vendor_src: GlobList,
    #[serde(default = "default_js_dest")]
    pub js_vendor_dest: String,

    #[serde(default = "default_php_src")]
    pub php_src: GlobList,
    #[serde(default = "default_imgs_src")]
    pub imgs_src: GlobList,

    #[serde(default = "default_fonts_src")]
    pub fonts_src: GlobList,
    #[serde(default = "default_fonts_dest")]
    pub fonts_dest: String,
    #[serde(default = "default_fonts_include")]
    pub fonts_include: GlobList,

    #[serde(default = "default_fonts_css_dest")]
    pub fonts_css_dest: String,
    #[serde(default = "default_fonts_css_include")]
    pub fonts_css_include: GlobList,
    #[serde(default = "default_fonts_css_filename")]
    pub fonts_css_filename: String,

    /// Files concatenated (in order) into the typography partial.
    #[serde(default = "default_fonts_sass_src")]
    pub fonts_sass_src: Vec<String>,
    #[serde(default = "default_fonts_sass_dest")]
    pub fonts_sass_dest: String,
    #[serde(default = "default_fonts_sass_filename")]
    pub fonts_sass_filename: String,
}

fn default_sass_src() -> GlobList {
    GlobList::from("./sass/**/*.scss")
}

fn default_sass_dest() -> String {
    "./".to_string()
}

fn default_js_src() -> GlobList {
    GlobList::from("./js/*.js")
}

fn default_js_dest() -> String {
    "./js/min/".to_string()
}

fn default_js_vendor_src() -> GlobList {
    GlobList::from("./js/vendor/**/*.js")
}

fn default_php_src() -> GlobList {
    GlobList::from("./**/*.php")
}

fn default_imgs_src() -> GlobList {
    GlobList::from("./imgs/*")
}

fn default_fonts_src() -> GlobList {
    GlobList::from("./fonts/*.{tar,tar.bz2,tar.gz,zip}")
}

fn default_fonts_dest() -> String {
    "./fonts/".to_string()
}

fn default_fonts_include() -> GlobList {
    GlobList::from("**/*.{svg,ttf,otf,eot,woff,woff2}")
}

fn default_fonts_css_dest() -> String {
    "./fonts/css".to_string()
}

fn default_fonts_css_include() -> GlobList {
    GlobList::from("*.css")
}

fn default_fonts_css_filename() -> String {
    "typography.css".to_string()
}

fn default_fonts_sass_src() -> Vec<String> {
    vec![
        "./fonts/css/typography.css".to_string(),
        "./sass/variables-site/_typography.scss".to_string(),
    ]
}

fn default_fonts_sass_dest() -> String {
    "./sass/variables-site/".to_string()
}

fn default_fonts_sass_filename() -> String {
    "_typography.scss".to_string()
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            sass_src: default_sass_src(),
            sass_dest: default_sass_dest(),
            js_src: default_js_src(),
            js_dest: default_js_dest(),
            js_vendor_src: default_js_vendor_src(),
            js_vendor_dest: default_js_dest(),
            php_src: default_php_src(),
            imgs_src: default_imgs_src(),
            fonts_src: default_fonts_src(),
            fonts_dest: default_fonts_dest(),
            fonts_include: default_fonts_include(),
            fonts_css_dest: default_fonts_css_dest(),
            fonts_css_include: default_fonts_css_include(),
            fonts_css_filename: default_fonts_css_filename(),
            fonts_sass_src: default_fonts_sass_src(),
            fonts_sass_dest: default_fonts_sass_dest(),
            fonts_sass_filename: default_fonts_sass_filename(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Inject changed stylesheets instead of reloading the page.
    #[serde(default = "default_true")]
    pub inject_changes: bool,
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            inject_changes: true,
        }
    }
}

/// `[tools]` section: command templates for the external collaborators.
///
/// Templates are run through the platform shell. Placeholders:
///
/// - `{source}`: the original source file
/// - `{source_dir}`: its directory
/// - `{input}`: scratch file holding the current stage input
/// - `{output}`: scratch file the tool must write
/// - `{archive}` / `{dir}`: extraction commands only
///
/// A stage template without `{input}`/`{source}` receives the input on stdin;
/// one without `{output}` must print its result on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_sass_cmd")]
    pub sass: String,
    #[serde(default = "default_postcss_cmd")]
    pub postcss: String,
    #[serde(default = "default_bundle_cmd")]
    pub bundle: String,
    #[serde(default = "default_unzip_cmd")]
    pub unzip: String,
    #[serde(default = "default_untar_cmd")]
    pub untar: String,
}

fn default_sass_cmd() -> String {
    "sass --no-charset --source-map-urls=absolute --load-path={source_dir} {source} {output}"
        .to_string()
}

fn default_postcss_cmd() -> String {
    "postcss {input} --output {output} --use autoprefixer --use cssnano --map".to_string()
}

fn default_bundle_cmd() -> String {
    "esbuild {source} --bundle --minify --format=iife --target=es2015 --sourcemap --outfile={output}"
        .to_string()
}

fn default_unzip_cmd() -> String {
    "unzip -qo {archive} -d {dir}".to_string()
}

fn default_untar_cmd() -> String {
    "tar -xf {archive} -C {dir}".to_string()
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            sass: default_sass_cmd(),
            postcss: default_postcss_cmd(),
            bundle: default_bundle_cmd(),
            unzip: default_unzip_cmd(),
            untar: default_untar_cmd(),
        }
    }
}

/// `[housekeeping]` section, used by the `build` invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct HousekeepingSection {
    /// Files removed if present.
    #[serde(default = "default_delete")]
    pub delete: Vec<String>,

    /// Folders created if missing.
    #[serde(default = "default_folders")]
    pub folders: Vec<String>,
}

fn default_delete() -> Vec<String> {
    vec!["./phpcs.xml.dist".to_string()]
}

fn default_folders() -> Vec<String> {
    vec!["imgs".to_string(), "fonts".to_string(), "js/vendor".to_string()]
}

impl Default for HousekeepingSection {
    fn default() -> Self {
        Self {
            delete: default_delete(),
            folders: default_folders(),
        }
    }
}

/// `[notify]` section: how the error sink alerts the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    /// Ring the terminal bell on failure.
    #[serde(default = "default_true")]
    pub bell: bool,

    /// Raise a desktop notification on failure.
    #[serde(default)]
    pub desktop: bool,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            bell: true,
            desktop: false,
        }
    }
}
