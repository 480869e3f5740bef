use ptrack_types::SocialListType;

/// Name given to a list's dynamic category, e.g. `FC [Jane Doe]` or
/// `LS#2 [Jane Doe]`.
pub fn category_name(list_type: SocialListType, list_number: u16, owner: &str) -> String {
    let abbr = list_type.abbreviation();
    if list_type.is_numbered() {
        format!("{abbr}#{list_number} [{owner}]")
    } else {
        format!("{abbr} [{owner}]")
    }
}

/// Display name of a list, e.g. `Free Company` or `Linkshell [2]`.
pub fn list_name(list_type: SocialListType, list_number: u16) -> String {
    if list_number == 0 {
        list_type.label().to_string()
    } else {
        format!("{} [{list_number}]", list_type.label())
    }
}
