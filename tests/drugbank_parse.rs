use patent_harvest::sources::drugbank::parse_drug_page;

const PAGE_URL: &str = "https://go.drugbank.com/drugs/DB00619";

const PAGE: &str = r#"<html><head><title>Imatinib: Uses, Interactions | DrugBank Online</title></head>
<body>
<h1 class="drug-name">Imatinib</h1>
<table id="patents" class="table">
  <thead><tr><th>Patent Number</th><th>Pediatric Extension</th><th>Approved</th><th>Expires (estimated)</th><th>Region</th></tr></thead>
  <tbody>
    <tr>
      <td><a href="https://patents.google.com/patent/US6894051B1/en">US6894051</a></td>
      <td>No</td>
      <td>2005-05-17</td>
      <td>2022-11-26</td>
      <td><img alt="US flag"><span hidden>US</span></td>
    </tr>
    <tr>
      <td>CA2093203</td>
      <td>Yes</td>
      <td>2002-02-05</td>
      <td>2013-04-02</td>
      <td>Canada</td>
    </tr>
    <tr><td>short row</td><td>No</td></tr>
  </tbody>
</table>
</body></html>"#;

#[test]
fn patent_rows_become_seeds() {
    let batch = parse_drug_page(PAGE, "DB00619", PAGE_URL);
    assert_eq!(batch.display_name.as_deref(), Some("Imatinib"));
    let ids: Vec<&str> = batch.records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(ids, vec!["US6894051", "CA2093203"]);

    let first = &batch.records[0];
    assert_eq!(
        first.source_urls.google_patents,
        "https://patents.google.com/patent/US6894051B1/en"
    );
    assert_eq!(
        first.source_urls.pubchem,
        "https://pubchem.ncbi.nlm.nih.gov/patent/US6894051"
    );
    let note = |key: &str| first.annotations.get(key).map(String::as_str);
    assert_eq!(note("pediatric_extension"), Some("No"));
    assert_eq!(note("approved_date"), Some("2005-05-17"));
    assert_eq!(note("expires_date"), Some("2022-11-26"));
    assert_eq!(note("country"), Some("US"));
    assert_eq!(note("drugbank_url"), Some(PAGE_URL));

    let second = &batch.records[1];
    assert_eq!(
        second.source_urls.google_patents,
        "https://patents.google.com/patent/CA2093203/en"
    );
    assert_eq!(
        second.annotations.get("country").map(String::as_str),
        Some("Canada")
    );
}

#[test]
fn page_without_table_yields_no_seeds() {
    let batch = parse_drug_page(
        "<html><title>Aspirin | DrugBank Online</title><body></body></html>",
        "DB00945",
        "https://go.drugbank.com/drugs/DB00945",
    );
    assert!(batch.records.is_empty());
    assert_eq!(batch.display_name.as_deref(), Some("Aspirin"));
}

#[test]
fn cell_text_is_decoded_and_trimmed() {
    let html = r#"<html><body><h1>Trastuzumab&nbsp;(DB00072)</h1>
<table id="patents"><tbody><tr>
  <td> <a href="https://patents.google.com/patent/EP1308455B1/en?oq=a&amp;b"> EP1308455 </a> </td>
  <td>No</td><td>2003&#8209;05&#8209;14</td><td>2021-01-01</td>
  <td><span hidden>EP</span> Europe</td>
</tr></tbody></table></body></html>"#;
    let batch = parse_drug_page(html, "DB00072", "https://go.drugbank.com/drugs/DB00072");
    assert_eq!(batch.display_name.as_deref(), Some("Trastuzumab"));
    assert_eq!(batch.records.len(), 1);
    let seed = &batch.records[0];
    assert_eq!(seed.identifier, "EP1308455");
    assert_eq!(
        seed.source_urls.google_patents,
        "https://patents.google.com/patent/EP1308455B1/en?oq=a&b"
    );
    assert_eq!(seed.annotations.get("approved_date").map(String::as_str), Some("2003\u{2011}05\u{2011}14"));
    assert_eq!(seed.annotations.get("country").map(String::as_str), Some("EP"));
}
