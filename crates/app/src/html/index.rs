/// Single-page client with the live feed and start/stop buttons.
pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Rep Tracker</title>
  <style>
    :root { color-scheme: dark; font-family: system-ui, sans-serif; }
    body { margin: 0; background: #101214; color: #e8e8e8; }
    main { display: grid; grid-template-columns: minmax(0, 3fr) minmax(220px, 1fr); gap: 1rem; padding: 1rem; }
    #feed { width: 100%; background: #000; border-radius: 6px; min-height: 240px; }
    .panel { background: #1a1d21; border-radius: 6px; padding: 1rem; }
    .metric { display: flex; justify-content: space-between; padding: 0.4rem 0; border-bottom: 1px solid #2a2e33; }
    .metric span:last-child { font-variant-numeric: tabular-nums; font-weight: 600; }
    #reps { font-size: 3rem; text-align: center; margin: 0.5rem 0 1rem; }
    button { width: 100%; padding: 0.6rem; margin-top: 0.5rem; border: 0; border-radius: 4px; font-size: 1rem; cursor: pointer; }
    #start { background: #2e8b57; color: #fff; }
    #stop { background: #b33a3a; color: #fff; }
    #log { margin-top: 1rem; font-size: 0.85rem; color: #9aa0a6; min-height: 1.2em; }
    @media (max-width: 720px) { main { grid-template-columns: 1fr; } }
  </style>
</head>
<body>
  <main>
    <img id="feed" src="/video_feed" alt="Live pose feed" />
    <section class="panel">
      <div id="reps">0</div>
      <div class="metric"><span>Stage</span><span id="stage">-</span></div>
      <div class="metric"><span>Elbow angle</span><span id="angle">-</span></div>
      <div class="metric"><span>Connection</span><span id="conn">connecting</span></div>
      <button id="start">Start tracking</button>
      <button id="stop">Stop tracking</button>
      <div id="log"></div>
    </section>
  </main>
  <script>
    const $ = (id) => document.getElementById(id);

    async function command(path) {
      try {
        const res = await fetch(path, { method: "POST" });
        const body = await res.json();
        $("log").textContent = body.error ? `${body.message}: ${body.error}` : body.message;
      } catch (err) {
        $("log").textContent = `Request failed: ${err}`;
      }
    }

    $("start").addEventListener("click", () => command("/start_tracking"));
    $("stop").addEventListener("click", () => command("/stop_tracking"));

    const events = new EventSource("/pose_data");
    events.onopen = () => { $("conn").textContent = "live"; };
    events.onerror = () => { $("conn").textContent = "reconnecting"; };
    events.addEventListener("pose_data", (event) => {
      const data = JSON.parse(event.data);
      $("reps").textContent = data.reps;
      $("stage").textContent = data.stage ?? "-";
      $("angle").textContent = `${data.angle.toFixed(1)}°`;
    });
  </script>
</body>
</html>
"#;
