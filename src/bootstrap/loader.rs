//! Inline loader script: the JavaScript side of [`super::state::Loader`].
//!
//! `Go(event, arg)` is the transition function. Event names and state names
//! match the Rust model one to one; `data-loader-state` on `<html>` mirrors
//! the current state for anyone inspecting the page.

use super::state::{
    LoaderState, MSG_DOWNLOAD_ERROR, MSG_EXECUTE, MSG_LOAD, MSG_NO_WEBGL, MSG_PARSE, MSG_PLAY,
    MSG_RUNTIME_ERROR, PROGRESS_BAR_WIDTH, PROGRESS_SKIP_EVENTS, TICK_MS,
};
use super::js_string;
use crate::config::PresentationConfig;
use crate::encoder::VIRTUAL_ROOT;

/// Accent colour for the play prompt and the progress bar.
const ACCENT: &str = "#2ecc40";
const ACCENT_LIGHT: &str = "#45d659";
const PANEL: &str = "#1a1a3e";

fn generate_text_table() -> String {
    let entries = [
        ("PLAYBTN", MSG_PLAY),
        ("LOAD", MSG_LOAD),
        ("PARSE", MSG_PARSE),
        ("EXECUTE", MSG_EXECUTE),
        ("DLERROR", MSG_DOWNLOAD_ERROR),
        ("NOWEBGL", MSG_NO_WEBGL),
        ("RUNERROR", MSG_RUNTIME_ERROR),
    ];
    let mut lines = vec!["var TXT =".to_string(), "{".to_string()];
    for (key, text) in entries {
        lines.push(format!("\t{key}: {},", js_string(text)));
    }
    lines.push("};".to_string());
    lines.join("\n")
}

fn generate_state_table() -> String {
    let entries: Vec<String> = LoaderState::NAMES
        .iter()
        .map(|name| format!("{}: '{name}'", name.to_ascii_uppercase()))
        .collect();
    format!("var S = {{ {} }};", entries.join(", "))
}

/// The complete `<script>` element for the loader.
pub(super) fn generate_loader_js(config: &PresentationConfig) -> String {
    let text_table = generate_text_table();
    let state_table = generate_state_table();
    let bundle = js_string(&config.bundle_file());
    let root = js_string(VIRTUAL_ROOT);
    let memory = config.memory_bytes();
    let stack = config.stack_bytes();
    let half_bar = PROGRESS_BAR_WIDTH / 2.0;

    format!(
        r##"<script type="text/javascript">(function(){{
{text_table}
{state_table}
var BUNDLE = {bundle}, ROOT = {root};
var MEMORY = {memory}, STACK = {stack};
var PROGRESS_SKIP = {PROGRESS_SKIP_EVENTS}, BAR_WIDTH = {PROGRESS_BAR_WIDTH}, TICK_MS = {TICK_MS};
var L = {{ state: S.IDLE, clickable: true, progress: 0 }};
var canvas = document.getElementById('canvas'), ctx;
var NoMenu = function(e) {{ e.preventDefault() }};
var Enter = function(s)
{{
	L.state = s;
	document.documentElement.setAttribute('data-loader-state', s);
}};
var Msg = function(m)
{{
	ctx.clearRect(0, 0, canvas.width, canvas.height);
	ctx.fillStyle = '#888';
	for (var i = 0, a = m.split('\n'), n = a.length; i != n; i++)
		ctx.fillText(a[i], canvas.width/2, canvas.height/2-(n-1)*20+10+i*40);
}};
var Bar = function(loaded, total)
{{
	var x = canvas.width/2-{half_bar}, y = canvas.height*.6, w = Math.min(total ? loaded/total : 1, 1)*BAR_WIDTH, g = ctx.createLinearGradient(x,0,x+w,0);
	g.addColorStop(0,'{ACCENT}');g.addColorStop(1,'{ACCENT_LIGHT}');
	ctx.fillStyle = '#111'; ctx.fillRect(x-2,y-2,BAR_WIDTH+4,28);
	ctx.fillStyle = '#222'; ctx.fillRect(x  ,y  ,BAR_WIDTH,24);
	ctx.fillStyle = g;      ctx.fillRect(x  ,y  ,w,  24);
}};
var Overlay = function(html)
{{
	var c = canvas || Module.canvas;
	c.outerHTML = '<div style="max-width:90%;width:'+c.clientWidth+'px;height:'+c.clientHeight+'px;background:#000;display:table-cell;vertical-align:middle"><div style="background-color:#FFF;color:#000;padding:1.5em;max-width:640px;width:80%;margin:auto;text-align:center">'+html+'</div></div>';
}};
var Inject = function(xhr)
{{
	var s = document.createElement('script'), d = document.documentElement;
	s.textContent = xhr.response;
	d.appendChild(s);
	d.removeChild(s);
	s = s.textContent = null;
}};
var Fetch = function()
{{
	var xhr = new XMLHttpRequest();
	xhr.open('GET', BUNDLE);
	xhr.onprogress = function(e) {{ Go('progress', e); }};
	xhr.onerror = xhr.onabort = function() {{ Go('dlerror', null); }};
	xhr.onload = function()
	{{
		if (xhr.status != 200) {{ Go('dlerror', xhr.status + ' ' + xhr.statusText); return; }}
		Go('loaded', xhr);
	}};
	xhr.send();
}};
var Go = function(ev, a)
{{
	var s = L.state;
	if (ev == 'click')
	{{
		if (!L.clickable) return;
		L.clickable = false;
		canvas.disabled = true;
		L.progress = 0;
		canvas.scrollIntoView();
		Enter(S.DOWNLOADING);
		Msg(TXT.LOAD);
		Fetch();
	}}
	else if (ev == 'progress' && s == S.DOWNLOADING)
	{{
		if (!a.lengthComputable || L.progress++ < PROGRESS_SKIP) return;
		Bar(a.loaded, a.total);
	}}
	else if (ev == 'dlerror' && s == S.DOWNLOADING)
	{{
		Enter(S.FAILED);
		Msg(TXT.DLERROR + (a ? '\nStatus: ' + a : ''));
		L.clickable = true;
		canvas.disabled = false;
	}}
	else if (ev == 'loaded' && s == S.DOWNLOADING)
	{{
		Enter(S.PREPARING);
		Msg(TXT.PARSE);
		setTimeout(function() {{ Go('tick', a); a = null; }}, TICK_MS);
	}}
	else if (ev == 'tick' && s == S.PREPARING)
	{{
		window.onerror = function(e,u,l) {{ Go('error', e+(u ? '<br>('+u+(l ? ':'+l : '')+')' : '')); }};
		Module = {{ TOTAL_MEMORY: MEMORY, TOTAL_STACK: STACK, currentScriptUrl: '-', preInit: function() {{ Go('ready'); }} }};
		Inject(a);
	}}
	else if (ev == 'ready' && s == S.PREPARING)
	{{
		Enter(S.EXECUTING);
		Msg(TXT.EXECUTE);
		Module.canvas = canvas.cloneNode(false);
		Module.canvas.oncontextmenu = NoMenu;
		Module.setWindowTitle = function(title) {{ }};
		Module.postRun = function() {{ Go('postrun', !!Module.noExitRuntime); }};
		setTimeout(function() {{ Go('tick'); }}, TICK_MS);
	}}
	else if (ev == 'tick' && s == S.EXECUTING)
	{{
		Module.run([ROOT]);
	}}
	else if (ev == 'postrun' && s == S.EXECUTING)
	{{
		if (!a) {{ Enter(S.FAILED); Overlay(TXT.NOWEBGL); return; }}
		canvas.parentNode.replaceChild(Module.canvas, canvas);
		Enter(S.RUNNING);
		Msg = Bar = ctx = canvas = null;
		Module.canvas.focus();
	}}
	else if (ev == 'error' && (s == S.PREPARING || s == S.EXECUTING || s == S.RUNNING))
	{{
		Enter(S.FAILED);
		Overlay(TXT.RUNERROR + '<br><br>' + a);
	}}
}};
var DoSetup = function()
{{
	canvas.onclick = function() {{ Go('click'); }};
	ctx.fillStyle = '#888';
	ctx.fillRect(canvas.width/2-254, canvas.height/2-104, 508, 208);
	ctx.fillStyle = '{PANEL}';
	ctx.fillRect(canvas.width/2-250, canvas.height/2-100, 500, 200);
	ctx.fillStyle = '{ACCENT}';
	ctx.fillText(TXT.PLAYBTN, canvas.width/2, canvas.height/2+10);
}};
canvas.oncontextmenu = NoMenu;
ctx = canvas.getContext('2d');
ctx.font = '30px "Courier New", monospace';
ctx.textAlign = 'center';
Enter(S.IDLE);
DoSetup();
}})()</script>"##,
    )
}
