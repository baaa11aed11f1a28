use axum::response::Html;

/// GET /
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Image Store</title>
  <style>
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f172a; color: #e2e8f0; padding: 2rem; }
    h1 { margin-bottom: 1.5rem; }
    form { display: flex; gap: 1rem; align-items: center; margin-bottom: 1rem; }
    button { background: #3b82f6; color: white; border: none; border-radius: 0.375rem; padding: 0.5rem 1rem; cursor: pointer; }
    button:hover { background: #2563eb; }
    #status { color: #94a3b8; font-size: 0.875rem; margin-bottom: 1.5rem; min-height: 1.25rem; }
    #gallery { display: grid; grid-template-columns: repeat(auto-fill, minmax(180px, 1fr)); gap: 1rem; }
    figure { background: #1e293b; border-radius: 0.5rem; overflow: hidden; }
    figure img { width: 100%; height: 160px; object-fit: cover; display: block; }
    figcaption { font-size: 0.75rem; padding: 0.5rem; word-break: break-all; color: #94a3b8; }
  </style>
</head>
<body>
  <h1>Image Store</h1>
  <form id="upload">
    <input type="file" name="image" accept="image/*" required>
    <button type="submit">Upload</button>
    <button type="button" id="refresh">Refresh</button>
  </form>
  <div id="status"></div>
  <div id="gallery"></div>

  <script>
    const status = document.getElementById('status');
    const gallery = document.getElementById('gallery');

    async function loadImages() {
      try {
        const res = await fetch('/images/list');
        const data = await res.json();
        if (!data.success) throw new Error(data.message);
        gallery.replaceChildren(...data.images.map(img => {
          const fig = document.createElement('figure');
          const el = document.createElement('img');
          el.src = img.url;
          el.alt = img.filename;
          el.loading = 'lazy';
          const cap = document.createElement('figcaption');
          cap.textContent = img.filename;
          fig.append(el, cap);
          return fig;
        }));
        status.textContent = data.images.length + ' images, listed ' + new Date(data.timestamp).toLocaleTimeString();
      } catch (e) {
        status.textContent = 'Failed to load images: ' + e.message;
      }
    }

    document.getElementById('upload').addEventListener('submit', async (ev) => {
      ev.preventDefault();
      status.textContent = 'Uploading...';
      try {
        const res = await fetch('/upload', { method: 'POST', body: new FormData(ev.target) });
        const data = await res.json();
        if (!data.success) throw new Error(data.message);
        ev.target.reset();
        await loadImages();
      } catch (e) {
        status.textContent = 'Upload failed: ' + e.message;
      }
    });

    document.getElementById('refresh').addEventListener('click', async () => {
      await fetch('/images/refresh-cache');
      await loadImages();
    });

    loadImages();
  </script>
</body>
</html>
"#;
