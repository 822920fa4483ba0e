//! Static offline verifier shipped inside every bundle.
//!
//! The page runs from the filesystem with no network access and depends
//! only on WebCrypto SHA-256. It checks manifest file hashes and replays
//! the custody-log transcript chain.

pub const VERIFY_HTML: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Evidence Vault - Verify Export</title>
    <style>
      body { font-family: ui-sans-serif, system-ui, -apple-system, sans-serif; margin: 32px; color: #1f2937; }
      h1 { font-size: 20px; margin-bottom: 8px; }
      p { font-size: 14px; color: #4b5563; }
      .card { border: 1px solid #e5e7eb; border-radius: 12px; padding: 16px; margin-top: 16px; }
      button { margin-top: 12px; padding: 8px 12px; border-radius: 8px; border: 1px solid #111827; background: #111827; color: #fff; cursor: pointer; }
      pre { background: #f9fafb; padding: 12px; border-radius: 8px; font-size: 12px; white-space: pre-wrap; }
    </style>
  </head>
  <body>
    <h1>Verify Evidence Vault export</h1>
    <p>Select the exported <strong>manifest.json</strong>, the <strong>custody_log.jsonl</strong>, and the files you want to verify.</p>

    <div class="card">
      <label>manifest.json</label><br />
      <input id="manifestInput" type="file" accept="application/json" />
      <div style="margin-top: 12px;">
        <label>custody_log.jsonl</label><br />
        <input id="custodyInput" type="file" />
      </div>
      <div style="margin-top: 12px;">
        <label>Exported files</label><br />
        <input id="fileInput" type="file" multiple />
      </div>
      <button id="verifyButton" type="button">Verify</button>
    </div>

    <div class="card">
      <h2>Results</h2>
      <pre id="output">No verification yet.</pre>
    </div>

    <script src="./verify.js"></script>
  </body>
</html>
"#;

pub const VERIFY_JS: &str = r#"(() => {
  const manifestInput = document.getElementById('manifestInput')
  const custodyInput = document.getElementById('custodyInput')
  const fileInput = document.getElementById('fileInput')
  const verifyButton = document.getElementById('verifyButton')
  const output = document.getElementById('output')

  const readFileText = (file) =>
    new Promise((resolve, reject) => {
      const reader = new FileReader()
      reader.onload = () => resolve(reader.result || '')
      reader.onerror = () => reject(reader.error)
      reader.readAsText(file)
    })

  const toHex = (buffer) =>
    Array.from(new Uint8Array(buffer))
      .map((b) => b.toString(16).padStart(2, '0'))
      .join('')

  const sha256Hex = async (bytes) => {
    const digest = await crypto.subtle.digest('SHA-256', bytes)
    return toHex(digest)
  }

  const hashFile = async (file) => sha256Hex(await file.arrayBuffer())

  const hashText = async (text) => sha256Hex(new TextEncoder().encode(text))

  const normalizeKey = (file) => file.webkitRelativePath || file.name

  const verifyFiles = async (manifest, files) => {
    const entries = Array.isArray(manifest.files) ? manifest.files : []
    const expected = new Map(entries.map((entry) => [entry.filename, entry.sha256]))
    const results = []
    let ok = 0
    let bad = 0
    for (const file of files) {
      const key = normalizeKey(file)
      const expectedHash =
        expected.get(key) || expected.get('media/' + file.name) || expected.get(file.name)
      if (!expectedHash) {
        results.push(key + ': no matching entry in manifest')
        continue
      }
      const actual = await hashFile(file)
      if (actual === expectedHash) {
        ok += 1
        results.push(key + ': OK')
      } else {
        bad += 1
        results.push(key + ': MISMATCH')
      }
    }
    results.push('Files: ' + ok + ' OK, ' + bad + ' mismatched')
    return results
  }

  const verifyCustodyLog = async (text) => {
    const byItem = new Map()
    const results = []
    const lines = text.split('\n').filter((line) => line.trim().length > 0)
    lines.forEach((line, index) => {
      try {
        const entry = JSON.parse(line)
        const list = byItem.get(entry.itemId) || []
        list.push(entry)
        byItem.set(entry.itemId, list)
      } catch (err) {
        results.push('line ' + (index + 1) + ': malformed entry, skipped')
      }
    })

    let okItems = 0
    let failedItems = 0
    for (const [itemId, entries] of byItem) {
      entries.sort((a, b) => a.ts - b.ts)
      const issues = []
      let prev = ''
      for (const entry of entries) {
        if (entry.exportPrevHashSha256 !== prev) {
          issues.push(entry.id + ': prev-hash mismatch')
        }
        const recomputed = await hashText(prev + entry.canonical)
        if (recomputed !== entry.exportHashSha256) {
          issues.push(entry.id + ': hash mismatch')
        }
        prev = entry.exportHashSha256
      }
      if (issues.length === 0) {
        okItems += 1
        results.push('item ' + itemId + ': OK (' + entries.length + ' events)')
      } else {
        failedItems += 1
        results.push('item ' + itemId + ': FAIL')
        for (const issue of issues) {
          results.push('  ' + issue)
        }
      }
    }
    results.push('Custody: ' + okItems + ' items OK, ' + failedItems + ' failed')
    return results
  }

  verifyButton.addEventListener('click', async () => {
    const manifestFile = manifestInput.files && manifestInput.files[0]
    const custodyFile = custodyInput.files && custodyInput.files[0]
    const files = fileInput.files ? Array.from(fileInput.files) : []

    if (!manifestFile && !custodyFile) {
      output.textContent = 'Select manifest.json or custody_log.jsonl to verify.'
      return
    }

    try {
      const results = []
      if (manifestFile && files.length > 0) {
        const manifest = JSON.parse(await readFileText(manifestFile))
        results.push(...(await verifyFiles(manifest, files)))
      }
      if (custodyFile) {
        results.push(...(await verifyCustodyLog(await readFileText(custodyFile))))
      }
      output.textContent = results.join('\n') || 'Nothing verified.'
    } catch (err) {
      output.textContent = 'Verification failed: ' + (err && err.message ? err.message : err)
    }
  })
})()
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_self_contained() {
        assert!(VERIFY_HTML.contains("verify.js"));
        assert!(!VERIFY_JS.contains("http://"));
        assert!(!VERIFY_JS.contains("https://"));
        assert!(VERIFY_JS.contains("exportHashSha256"));
    }
}
