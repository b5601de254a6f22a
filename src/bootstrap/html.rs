//! Page shell: markup and styling around the loader canvas.

use super::html_escape;
use super::loader::generate_loader_js;
use crate::config::{ControlHint, PresentationConfig};

fn generate_css(width: u32) -> String {
    format!(
        r##"html, body
{{
	background-color: #111128;
	margin: 0;
	height: 100%;
	font-family: "Courier New", monospace;
	font-size: 18px;
	color: #e0e0f0;
}}
#wrapper
{{
	margin: 0 0 -21px;
	padding: 1px;
	min-height: 100%;
	border-bottom: 21px solid transparent;
	box-sizing: border-box;
}}
#title
{{
	background-color: #2ecc40;
	margin: 9px auto;
	max-width: {width}px;
	padding: .5em;
	border: 1px solid #1a8a2a;
	border-radius: 10px;
	box-shadow: 3px 3px 0 0 rgba(0,0,0,0.3);
	text-align: center;
	color: #111128;
	font-weight: bold;
}}
#main
{{
	background-color: #1a1a3e;
	margin: 9px auto;
	max-width: {main_width}px;
	padding: 15px 0;
	border: 1px solid #333;
	border-radius: 10px;
	box-shadow: 3px 3px 0 0 rgba(0,0,0,0.3);
}}
#controls
{{
	margin: 8px auto;
	max-width: {width}px;
	text-align: center;
	font-size: 13px;
	color: #888;
}}
#controls kbd
{{
	background: #222;
	border: 1px solid #555;
	border-radius: 3px;
	padding: 1px 6px;
	font-family: inherit;
	color: #ccc;
}}
#footer
{{
	padding-top: 3px;
	height: 17px;
	border-top: 1px dashed #444;
	color: #666;
	font-size: 9pt;
	text-align: center;
}}
#footer a {{ color: #2ecc40; }}
@media (max-width: 850px)
{{
	#wrapper {{ font-size: 80%; }}
	#title {{ padding: .2em; }}
}}"##,
        main_width = width + 30,
    )
}

fn generate_controls_html(controls: &[ControlHint]) -> String {
    if controls.is_empty() {
        return String::new();
    }
    let hints: Vec<String> = controls
        .iter()
        .map(|hint| {
            let keys: String = hint
                .keys
                .iter()
                .map(|k| format!("<kbd>{}</kbd>", html_escape(k)))
                .collect();
            format!("{keys} {}", html_escape(&hint.action))
        })
        .collect();
    format!(
        "\t<div id=\"controls\">\n\t\t{}\n\t</div>\n",
        hints.join(" &nbsp; ")
    )
}

fn generate_footer_html(footer: bool) -> &'static str {
    if footer {
        "<div id=\"footer\">Made with <a href=\"https://love2d.org/\" target=\"_blank\">L\u{d6}VE</a></div>\n"
    } else {
        ""
    }
}

/// Full bootstrap document.
pub(super) fn generate_page(config: &PresentationConfig) -> String {
    let title = html_escape(&config.title);
    let css = generate_css(config.width);
    let controls = generate_controls_html(&config.controls);
    let footer = generate_footer_html(config.footer);
    let loader = generate_loader_js(config);
    let (width, height) = (config.width, config.height);

    format!(
        r##"<!DOCTYPE html>
<html lang="en-us">
<head>
	<meta charset="utf-8">
	<meta name="viewport" content="width=device-width, initial-scale=1">
	<title>{title}</title>
	<style type="text/css">
{css}
	</style>
</head>
<body>
<div id="wrapper">
	<h1 id="title">{title}</h1>
	<div id="main">
		<center><canvas id="canvas" width="{width}" height="{height}" style="max-width:100%;background:#000;vertical-align:middle"></canvas></center>
	</div>
{controls}</div>
{footer}{loader}
</body>
</html>
"##,
    )
}
