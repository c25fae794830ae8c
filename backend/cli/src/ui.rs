//! The single-page chat shell served at `/`.
//!
//! The page lists the hosted profiles, opens the profile's relay socket, and
//! renders messages, notices and phase changes as they arrive. Input is
//! disabled while an exchange is in flight.

pub const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Confab</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 0; display: flex; height: 100vh; }
  nav { width: 220px; border-right: 1px solid #ddd; padding: 1rem; }
  nav button { display: block; width: 100%; margin-bottom: .5rem; padding: .5rem; text-align: left; }
  nav button.active { font-weight: bold; background: #eef; }
  main { flex: 1; display: flex; flex-direction: column; }
  #log { flex: 1; overflow-y: auto; padding: 1rem; }
  .msg { margin-bottom: 1rem; }
  .msg .sender { font-weight: bold; }
  .msg pre { white-space: pre-wrap; margin: .25rem 0 0; }
  .msg img { max-width: 480px; display: block; margin-top: .5rem; }
  .notice { color: #b00; margin-bottom: 1rem; }
  #status { color: #666; padding: 0 1rem; }
  form { display: flex; padding: 1rem; gap: .5rem; border-top: 1px solid #ddd; }
  form input { flex: 1; padding: .5rem; }
</style>
</head>
<body>
<nav>
  <h3>Profiles</h3>
  <div id="profiles"></div>
  <hr>
  <button id="clear" type="button">Clear work dir</button>
  <button id="analyze" type="button">Analyze group chat</button>
</nav>
<main>
  <div id="log"></div>
  <div id="status">idle</div>
  <form id="chat">
    <input id="input" autocomplete="off" placeholder="Type a message...">
    <button type="submit">Send</button>
  </form>
</main>
<script>
const log = document.getElementById('log');
const status = document.getElementById('status');
const input = document.getElementById('input');
let current = null;
let socket = null;

function escapeHtml(s) {
  return s.replace(/[&<>"]/g, c => ({'&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;'}[c]));
}

function text(message) {
  if (message.content) return message.content;
  if (message.tool_calls && message.tool_calls.length)
    return message.tool_calls.map(c => `***** Suggested tool call: ${c.name}(${c.arguments}) *****`).join('\n');
  if (message.tool_responses && message.tool_responses.length)
    return message.tool_responses.map(r => `***** Response from calling tool "${r.name}" *****\n${r.content}`).join('\n');
  return '';
}

function renderMessage(message) {
  const div = document.createElement('div');
  div.className = 'msg';
  const body = text(message);
  const images = [...body.matchAll(/!\[[^\]]*\]\((https?:[^)\s]+)\)|<img (https?:[^>\s]+)>/g)]
    .map(m => m[1] || m[2]);
  div.innerHTML = `<div class="sender">${escapeHtml(message.sender)}</div><pre>${escapeHtml(body)}</pre>`
    + images.map(u => `<img src="${escapeHtml(u)}">`).join('');
  log.appendChild(div);
  log.scrollTop = log.scrollHeight;
}

function renderNotice(text) {
  const div = document.createElement('div');
  div.className = 'notice';
  div.textContent = text;
  log.appendChild(div);
}

function setBusy(busy) {
  input.disabled = busy;
}

async function select(name) {
  current = name;
  document.querySelectorAll('#profiles button').forEach(b => b.classList.toggle('active', b.dataset.name === name));
  log.innerHTML = '';
  const res = await fetch(`/api/profiles/${name}/transcript`);
  const body = await res.json();
  body.messages.forEach(renderMessage);
  setBusy(body.busy);
  if (socket) socket.close();
  socket = new WebSocket(`${location.protocol === 'https:' ? 'wss' : 'ws'}://${location.host}/api/profiles/${name}/ws`);
  socket.onmessage = ev => {
    const event = JSON.parse(ev.data);
    if (event.type === 'message') renderMessage(event.message);
    else if (event.type === 'notice') renderNotice(event.text);
    else if (event.type === 'phase') { status.textContent = event.phase; setBusy(event.phase === 'awaiting_reply' || event.phase === 'tool_dispatch'); }
  };
}

document.getElementById('chat').addEventListener('submit', async ev => {
  ev.preventDefault();
  const message = input.value;
  if (!current || !message.trim()) return;
  input.value = '';
  const res = await fetch(`/api/profiles/${current}/chat`, {
    method: 'POST', headers: {'Content-Type': 'application/json'}, body: JSON.stringify({message}),
  });
  if (!res.ok) renderNotice((await res.json()).error);
});

document.getElementById('clear').addEventListener('click', async () => {
  if (!current) return;
  const res = await fetch(`/api/profiles/${current}/workdir/clear`, {method: 'POST'});
  const body = await res.json();
  renderNotice(res.ok ? `Removed ${body.removed} file(s).` : body.error);
});

document.getElementById('analyze').addEventListener('click', async () => {
  const res = await fetch('/api/analysis', {method: 'POST'});
  const body = await res.json();
  if (res.ok) renderMessage({sender: 'Analysis', content: body.analysis});
  else renderNotice(body.error);
});

fetch('/api/profiles').then(r => r.json()).then(({profiles}) => {
  const nav = document.getElementById('profiles');
  profiles.forEach(p => {
    const b = document.createElement('button');
    b.textContent = p.title;
    b.dataset.name = p.name;
    b.onclick = () => select(p.name);
    nav.appendChild(b);
  });
  if (profiles.length) select(profiles[0].name);
});
</script>
</body>
</html>
"#;
