use scraper::{ElementRef, Html, Selector};

/// The first form in `html`, preferring the one inside `#transaction-block`.
#[track_caller]
pub(crate) fn must_get_form(html: &Html) -> ElementRef<'_> {
    let in_block = Selector::parse("#transaction-block form").unwrap();
    let any_form = Selector::parse("form").unwrap();

    html.select(&in_block)
        .next()
        .or_else(|| html.select(&any_form).next())
        .expect("No form found")
}

#[track_caller]
pub(crate) fn assert_hx_endpoint(form: &ElementRef<'_>, endpoint: &str, attribute: &str) {
    let got = form
        .value()
        .attr(attribute)
        .unwrap_or_else(|| panic!("{attribute} attribute missing"));

    assert_eq!(
        got, endpoint,
        "want form with attribute {attribute}=\"{endpoint}\", got {got:?}"
    );
}

#[track_caller]
fn must_get_input<'a>(form: &ElementRef<'a>, name: &str) -> ElementRef<'a> {
    let selector = Selector::parse(&format!("input[name=\"{name}\"]")).unwrap();

    form.select(&selector)
        .next()
        .unwrap_or_else(|| panic!("No input found with name \"{name}\""))
}

/// Checks that the required input `name` exists with the given `type`.
#[track_caller]
pub(crate) fn assert_form_input(form: &ElementRef<'_>, name: &str, type_: &str) {
    let input = must_get_input(form, name);
    let got_type = input.value().attr("type").unwrap_or_default();

    assert_eq!(
        got_type, type_,
        "want input {name} with type \"{type_}\", got {got_type:?}"
    );
    assert!(
        input.value().attr("required").is_some(),
        "want input with name {name} to have the required attribute but got none"
    );
}

#[track_caller]
pub(crate) fn assert_form_input_with_value(
    form: &ElementRef<'_>,
    name: &str,
    type_: &str,
    value: &str,
) {
    assert_form_input(form, name, type_);

    let got_value = must_get_input(form, name)
        .value()
        .attr("value")
        .unwrap_or_default();
    assert_eq!(
        got_value, value,
        "want input {name} with value \"{value}\", got {got_value:?}"
    );
}

#[track_caller]
pub(crate) fn assert_form_submit_button_with_text(form: &ElementRef<'_>, text: &str) {
    let submit_button = form
        .select(&Selector::parse("button[type=submit]").unwrap())
        .next()
        .expect("No submit button found");

    let got_text = submit_button.text().collect::<String>();
    assert_eq!(text, got_text.trim());
}

/// Checks the error message shown under the field `name`.
///
/// The message is the `p` that sits next to the field, found by walking up from
/// the input until a container with a `p` child is reached.
#[track_caller]
pub(crate) fn assert_field_error(form: &ElementRef<'_>, name: &str, want_message: &str) {
    let input = must_get_input(form, name);

    let got_message = input
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|element| element.value().name() != "form")
        .find_map(|container| {
            container
                .children()
                .filter_map(ElementRef::wrap)
                .find(|child| child.value().name() == "p")
        })
        .unwrap_or_else(|| panic!("No error message found for the field \"{name}\""))
        .text()
        .collect::<String>();

    assert_eq!(want_message, got_message.trim());
}

/// Checks that no field of the form shows an error message.
#[track_caller]
pub(crate) fn assert_no_field_errors(form: &ElementRef<'_>) {
    let errors = form
        .select(&Selector::parse("p.text-red-500").unwrap())
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>();

    assert!(errors.is_empty(), "want no field errors, got {errors:?}");
}
